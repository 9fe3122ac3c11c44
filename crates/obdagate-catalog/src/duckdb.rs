//! DuckDB-backed catalog (uploaded spreadsheets are loaded into DuckDB tables).

use std::path::{Path, PathBuf};

use ::duckdb::{params, AccessMode, Config, Connection};

use crate::{SchemaCatalog, SchemaUnavailable};

/// Reads table metadata from a DuckDB database file through
/// `information_schema`, read-only, one connection per call.
#[derive(Debug, Clone)]
pub struct DuckDbCatalog {
    path: PathBuf,
}

impl DuckDbCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, SchemaUnavailable> {
        let config = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .map_err(|e| unavailable(&self.path, e))?;
        Connection::open_with_flags(&self.path, config).map_err(|e| unavailable(&self.path, e))
    }
}

fn unavailable(path: &Path, err: ::duckdb::Error) -> SchemaUnavailable {
    SchemaUnavailable::new(format!("{}: {err}", path.display()))
}

impl SchemaCatalog for DuckDbCatalog {
    fn list_tables(&self) -> Result<Vec<String>, SchemaUnavailable> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = 'main' ORDER BY table_name",
            )
            .map_err(|e| unavailable(&self.path, e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| unavailable(&self.path, e))?;
        rows.collect::<::duckdb::Result<Vec<_>>>()
            .map_err(|e| unavailable(&self.path, e))
    }

    fn columns_of(&self, table: &str) -> Result<Vec<String>, SchemaUnavailable> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_schema = 'main' AND table_name = ? \
                 ORDER BY ordinal_position",
            )
            .map_err(|e| unavailable(&self.path, e))?;
        let rows = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))
            .map_err(|e| unavailable(&self.path, e))?;
        let columns = rows
            .collect::<::duckdb::Result<Vec<_>>>()
            .map_err(|e| unavailable(&self.path, e))?;
        if columns.is_empty() {
            return Err(SchemaUnavailable::new(format!(
                "{}: no such table `{table}`",
                self.path.display()
            )));
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mydatabase.duckdb");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE patients (Age INTEGER, Status VARCHAR, Notes VARCHAR);
             CREATE TABLE \"lab results\" (\"Patient ID\" VARCHAR, value DOUBLE);",
        )
        .unwrap();
        (dir, path)
    }

    #[test]
    fn lists_tables_and_ordered_columns() {
        let (_dir, path) = fixture();
        let catalog = DuckDbCatalog::new(&path);
        assert_eq!(
            catalog.list_tables().unwrap(),
            vec!["lab results", "patients"]
        );
        assert_eq!(
            catalog.columns_of("patients").unwrap(),
            vec!["Age", "Status", "Notes"]
        );
        assert_eq!(
            catalog.columns_of("lab results").unwrap(),
            vec!["Patient ID", "value"]
        );
    }

    #[test]
    fn sees_tables_created_after_construction() {
        let (_dir, path) = fixture();
        let catalog = DuckDbCatalog::new(&path);
        assert_eq!(catalog.list_tables().unwrap().len(), 2);
        {
            let writer = Connection::open(&path).unwrap();
            writer.execute_batch("CREATE TABLE visits (id INTEGER)").unwrap();
        }
        assert_eq!(catalog.snapshot().unwrap().tables.len(), 3);
    }

    #[test]
    fn missing_database_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = DuckDbCatalog::new(dir.path().join("missing.duckdb"));
        assert!(catalog.snapshot().is_err());
    }

    #[test]
    fn unknown_table_is_unavailable() {
        let (_dir, path) = fixture();
        assert!(DuckDbCatalog::new(&path).columns_of("nope").is_err());
    }
}
