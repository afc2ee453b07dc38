//! Configuration management for LedgerDB

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main configuration structure for LedgerDB
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML/JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

        let config: Config = if path.as_ref().extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {e}")))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {e}")))?
        };

        Ok(config)
    }

    /// Configuration rooted at the given data directory, defaults elsewhere
    pub fn with_data_dir(data_dir: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.storage.data_dir = data_dir.into();
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per table
    pub data_dir: String,
    /// Pretty-print table files
    pub pretty: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            pretty: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Join-anchor columns indexed automatically when a table has them
    pub auto_index_columns: Vec<String>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            auto_index_columns: vec!["user_id".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.data_dir, "data");
        assert_eq!(config.index.auto_index_columns, vec!["user_id"]);
        assert!(!config.logging.json);
    }

    #[test]
    fn test_load_toml_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerdb.toml");
        std::fs::write(
            &path,
            "[storage]\ndata_dir = \"/tmp/ledger\"\n\n[index]\nauto_index_columns = [\"account_id\"]\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.storage.data_dir, "/tmp/ledger");
        assert!(config.storage.pretty);
        assert_eq!(config.index.auto_index_columns, vec!["account_id"]);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledgerdb.json");
        std::fs::write(&path, r#"{"logging": {"level": "debug", "json": true}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_errors_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert_eq!(Config::load(&missing).unwrap_err().kind(), ErrorKind::Config);

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "storage = [").unwrap();
        assert_eq!(Config::load(&bad).unwrap_err().kind(), ErrorKind::Config);
    }
}
