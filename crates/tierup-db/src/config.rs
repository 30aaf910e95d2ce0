//! Application configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use tierup_core::UpgradeThresholds;

use crate::pool::DbConfig;

/// Runtime configuration of the `upgrade-levels` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file (`TIERUP_DATABASE_PATH`)
    pub database_path: PathBuf,

    /// Pool size (`TIERUP_DB_MAX_CONNECTIONS`, at least 1)
    pub max_connections: u32,

    /// Upgrade thresholds (`TIERUP_MIN_LOGIN_FOR_SILVER`, `TIERUP_MIN_RECOMMEND_FOR_GOLD`)
    pub thresholds: UpgradeThresholds,

    /// Tracing filter directive (`TIERUP_LOG`)
    pub log_filter: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = UpgradeThresholds::default();

        let config = AppConfig {
            database_path: lookup("TIERUP_DATABASE_PATH")
                .unwrap_or_else(|| "./tierup.db".to_string())
                .into(),

            max_connections: lookup("TIERUP_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TIERUP_DB_MAX_CONNECTIONS".to_string()))?,

            thresholds: UpgradeThresholds {
                min_login_for_silver: lookup("TIERUP_MIN_LOGIN_FOR_SILVER")
                    .unwrap_or_else(|| defaults.min_login_for_silver.to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("TIERUP_MIN_LOGIN_FOR_SILVER".to_string())
                    })?,

                min_recommend_for_gold: lookup("TIERUP_MIN_RECOMMEND_FOR_GOLD")
                    .unwrap_or_else(|| defaults.min_recommend_for_gold.to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("TIERUP_MIN_RECOMMEND_FOR_GOLD".to_string())
                    })?,
            },

            log_filter: lookup("TIERUP_LOG").unwrap_or_else(|| "info".to_string()),
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "TIERUP_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(config)
    }

    /// Pool configuration for this application.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .min_connections(1)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_path, PathBuf::from("./tierup.db"));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.thresholds, UpgradeThresholds::default());
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("TIERUP_DATABASE_PATH", "/var/lib/tierup/users.db"),
            ("TIERUP_DB_MAX_CONNECTIONS", "2"),
            ("TIERUP_MIN_LOGIN_FOR_SILVER", "10"),
            ("TIERUP_MIN_RECOMMEND_FOR_GOLD", "3"),
            ("TIERUP_LOG", "tierup_db=debug"),
        ]))
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/tierup/users.db"));
        assert_eq!(config.db_config().max_connections, 2);
        assert_eq!(config.thresholds.min_login_for_silver, 10);
        assert_eq!(config.thresholds.min_recommend_for_gold, 3);
        assert_eq!(config.log_filter, "tierup_db=debug");
    }

    #[test]
    fn test_invalid_values() {
        let err = AppConfig::from_lookup(lookup(&[("TIERUP_DB_MAX_CONNECTIONS", "0")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for TIERUP_DB_MAX_CONNECTIONS");

        let err =
            AppConfig::from_lookup(lookup(&[("TIERUP_MIN_LOGIN_FOR_SILVER", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(var) if var == "TIERUP_MIN_LOGIN_FOR_SILVER"));
    }
}
