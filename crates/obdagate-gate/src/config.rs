use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::level::LevelPolicy;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/sparql";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Gate configuration, loaded from a config file section and/or environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub allowlist_path: PathBuf,
    pub levels_path: PathBuf,
    pub level_policy: LevelPolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            allowlist_path: PathBuf::from("allowed_queries.json"),
            levels_path: PathBuf::from("levels.json"),
            level_policy: LevelPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
}

impl GateConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Override fields from `OBDAGATE_ENDPOINT`, `OBDAGATE_TIMEOUT_SECS`,
    /// `OBDAGATE_ALLOWLIST`, `OBDAGATE_LEVELS` and `OBDAGATE_LEVEL_POLICY`.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(|name| std::env::var(name).ok())
    }

    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(v) = var("OBDAGATE_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = var("OBDAGATE_TIMEOUT_SECS") {
            self.timeout_secs = v.trim().parse().map_err(|e| ConfigError::Invalid {
                var: "OBDAGATE_TIMEOUT_SECS",
                message: format!("{e}"),
            })?;
        }
        if let Some(v) = var("OBDAGATE_ALLOWLIST") {
            self.allowlist_path = PathBuf::from(v);
        }
        if let Some(v) = var("OBDAGATE_LEVELS") {
            self.levels_path = PathBuf::from(v);
        }
        if let Some(v) = var("OBDAGATE_LEVEL_POLICY") {
            self.level_policy = v.parse().map_err(|message| ConfigError::Invalid {
                var: "OBDAGATE_LEVEL_POLICY",
                message,
            })?;
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "OBDAGATE_TIMEOUT_SECS",
                message: "timeout must be at least one second".to_string(),
            });
        }
        Ok(self)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = GateConfig::default().with_vars(vars(&[])).unwrap();
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.timeout(), Duration::from_secs(10));
        assert_eq!(cfg.level_policy, LevelPolicy::PerIdentity);
    }

    #[test]
    fn environment_overrides() {
        let cfg = GateConfig::default()
            .with_vars(vars(&[
                ("OBDAGATE_ENDPOINT", "http://ontop:8080/sparql"),
                ("OBDAGATE_TIMEOUT_SECS", "3"),
                ("OBDAGATE_LEVEL_POLICY", "global"),
                ("OBDAGATE_LEVELS", "/var/lib/obdagate/levels.json"),
            ]))
            .unwrap();
        assert_eq!(cfg.endpoint, "http://ontop:8080/sparql");
        assert_eq!(cfg.timeout_secs, 3);
        assert_eq!(cfg.level_policy, LevelPolicy::Global);
        assert_eq!(cfg.levels_path, PathBuf::from("/var/lib/obdagate/levels.json"));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(GateConfig::default()
            .with_vars(vars(&[("OBDAGATE_TIMEOUT_SECS", "soon")]))
            .is_err());
        assert!(GateConfig::default()
            .with_vars(vars(&[("OBDAGATE_TIMEOUT_SECS", "0")]))
            .is_err());
        assert!(GateConfig::default()
            .with_vars(vars(&[("OBDAGATE_LEVEL_POLICY", "anyone")]))
            .is_err());
    }
}
