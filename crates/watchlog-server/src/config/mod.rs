//! Daemon configuration.
//!
//! This module provides configuration management for the `watchlogd` daemon.
//! The file format is TOML:
//!
//! ```toml
//! log_level = "info"
//!
//! [store]
//! keyspace = "history"
//!
//! [compaction]
//! worker_pool_size = 8
//! sweep_cooldown_seconds = 60
//! age_limit_hours = 72
//! ```

use std::path::Path;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use watchlog_common::config::CompactionConfig;
use watchlog_store::schema::ReplicationClass;

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Log level (error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Store connection settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Compaction scheduler settings.
    #[serde(default)]
    pub compaction: CompactionConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            store: StoreConfig::default(),
            compaction: CompactionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.compaction.validate()?;
        Ok(())
    }
}

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Contact points. Empty selects the in-memory store; this build has no
    /// CQL driver, so `watchlogd` refuses to start when any are set.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Keyspace holding the watch-history tables.
    #[serde(default = "default_keyspace")]
    pub keyspace: String,

    /// Keyspace replication strategy name.
    #[serde(default = "default_replication_class")]
    pub replication_class: String,

    /// Keyspace replication factor.
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
}

fn default_keyspace() -> String {
    "watch_history".to_string()
}

fn default_replication_class() -> String {
    ReplicationClass::default().as_str().to_string()
}

fn default_replication_factor() -> u32 {
    1
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            keyspace: default_keyspace(),
            replication_class: default_replication_class(),
            replication_factor: default_replication_factor(),
        }
    }
}

impl StoreConfig {
    /// Returns true if no contact point is configured.
    pub fn is_memory(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Returns the parsed replication strategy.
    pub fn replication(&self) -> Result<ReplicationClass> {
        match ReplicationClass::parse(&self.replication_class) {
            Some(class) => Ok(class),
            None => bail!(
                "store.replication_class must be SimpleStrategy or NetworkTopologyStrategy, got {}",
                self.replication_class
            ),
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<()> {
        if self.keyspace.is_empty() {
            bail!("store.keyspace must not be empty");
        }
        if self.replication_factor == 0 {
            bail!("store.replication_factor must be at least 1");
        }
        self.replication()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(config.store.is_memory());
        assert_eq!(config.compaction.worker_pool_size, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml() {
        let config = ServerConfig::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[compaction]"));
        assert!(toml.contains("worker_pool_size"));
        assert!(toml.contains("keyspace"));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("watchlogd.toml");

        let mut config = ServerConfig::default();
        config.compaction = config.compaction.with_worker_pool_size(3);
        config.store.keyspace = "history".to_string();
        config.save(&path).unwrap();

        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.compaction.worker_pool_size, 3);
        assert_eq!(loaded.store.keyspace, "history");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("watchlogd.toml");
        std::fs::write(&path, "[compaction]\nage_limit_hours = 24\n").unwrap();

        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.compaction.age_limit_hours, 24);
        assert_eq!(loaded.compaction.sweep_cooldown_seconds, 60);
        assert_eq!(loaded.log_level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_sections() {
        let mut config = ServerConfig::default();
        config.compaction.sweep_cooldown_seconds = 5;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.store.replication_class = "Everywhere".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.store.replication_factor = 0;
        assert!(config.validate().is_err());
    }
}
