//! `obdagate.json` configuration.
//!
//! Precedence: command-line flags, then environment, then the config file,
//! then defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use obdagate_catalog::{DdlCatalog, SchemaCatalog, SqliteCatalog};
use obdagate_gate::GateConfig;

pub const DEFAULT_CONFIG_FILE: &str = "obdagate.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Operator-authored template document.
    pub template: PathBuf,
    /// Instantiated document consumed by the downstream engine.
    pub instantiated: PathBuf,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("mapping.template.obda"),
            instantiated: PathBuf::from("mapping.obda"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub sqlite: Option<PathBuf>,
    pub duckdb: Option<PathBuf>,
    pub ddl: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObdagateConfig {
    pub mapping: MappingConfig,
    pub catalog: CatalogConfig,
    pub gate: GateConfig,
}

impl ObdagateConfig {
    /// Read `path`, or `obdagate.json` in the working directory when no path
    /// is given and that file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = var("OBDAGATE_TEMPLATE") {
            self.mapping.template = v.into();
        }
        if let Some(v) = var("OBDAGATE_INSTANTIATED") {
            self.mapping.instantiated = v.into();
        }
        if let Some(v) = var("OBDAGATE_SQLITE") {
            self.catalog.sqlite = Some(v.into());
        }
        if let Some(v) = var("OBDAGATE_DUCKDB") {
            self.catalog.duckdb = Some(v.into());
        }
        if let Some(v) = var("OBDAGATE_DDL") {
            self.catalog.ddl = Some(v.into());
        }
        self.gate = self.gate.with_vars(&var)?;
        Ok(self)
    }

    /// First configured of sqlite, duckdb, ddl.
    pub fn catalog(&self) -> Result<Box<dyn SchemaCatalog>> {
        let CatalogConfig {
            sqlite,
            duckdb,
            ddl,
        } = &self.catalog;
        match (sqlite, duckdb, ddl) {
            (Some(db), _, _) => Ok(Box::new(SqliteCatalog::new(db))),
            (None, Some(db), _) => duckdb_catalog(db),
            (None, None, Some(ddl)) => Ok(Box::new(DdlCatalog::new(ddl))),
            (None, None, None) => anyhow::bail!(
                "no schema catalog configured (set catalog.sqlite, catalog.duckdb or catalog.ddl, or pass --sqlite/--duckdb/--ddl)"
            ),
        }
    }
}

#[cfg(feature = "duckdb")]
fn duckdb_catalog(path: &Path) -> Result<Box<dyn SchemaCatalog>> {
    Ok(Box::new(obdagate_catalog::DuckDbCatalog::new(path)))
}

#[cfg(not(feature = "duckdb"))]
fn duckdb_catalog(path: &Path) -> Result<Box<dyn SchemaCatalog>> {
    anyhow::bail!(
        "catalog.duckdb is set to {} but obdagate was built without duckdb support",
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obdagate.json");
        std::fs::write(
            &path,
            r#"{"catalog": {"sqlite": "uploads.sqlite"}, "gate": {"level_policy": "global"}}"#,
        )
        .unwrap();
        let cfg = ObdagateConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.catalog.sqlite, Some(PathBuf::from("uploads.sqlite")));
        assert_eq!(cfg.mapping, MappingConfig::default());
        assert_eq!(cfg.gate.level_policy, obdagate_gate::LevelPolicy::Global);
        assert_eq!(cfg.gate.timeout_secs, 10);
    }

    #[test]
    fn environment_overrides_file() {
        let cfg = ObdagateConfig::default()
            .with_vars(|name| match name {
                "OBDAGATE_INSTANTIATED" => Some("/srv/ontop/mapping.obda".to_string()),
                "OBDAGATE_TIMEOUT_SECS" => Some("30".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(cfg.mapping.instantiated, PathBuf::from("/srv/ontop/mapping.obda"));
        assert_eq!(cfg.gate.timeout_secs, 30);
    }

    #[test]
    fn sqlite_wins_over_ddl() {
        let mut cfg = ObdagateConfig::default();
        assert!(cfg.catalog().is_err());
        cfg.catalog.ddl = Some("schema.sql".into());
        cfg.catalog.sqlite = Some("db.sqlite".into());
        assert!(cfg.catalog().is_ok());
    }

    #[cfg(feature = "duckdb")]
    #[test]
    fn duckdb_store_is_read_through_its_own_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("mydatabase.duckdb");
        {
            let conn = duckdb::Connection::open(&db).unwrap();
            conn.execute_batch("CREATE TABLE patients (Age INTEGER, Status VARCHAR)")
                .unwrap();
        }
        let ddl = dir.path().join("schema.sql");
        std::fs::write(&ddl, "CREATE TABLE other (x INT);").unwrap();

        let cfg = ObdagateConfig::default()
            .with_vars(|name| match name {
                "OBDAGATE_DUCKDB" => Some(db.display().to_string()),
                "OBDAGATE_DDL" => Some(ddl.display().to_string()),
                _ => None,
            })
            .unwrap();
        let snapshot = cfg.catalog().unwrap().snapshot().unwrap();
        assert_eq!(
            snapshot.columns("patients"),
            Some(&["Age".to_string(), "Status".to_string()][..])
        );
        assert!(!snapshot.contains("other"));
    }
}
