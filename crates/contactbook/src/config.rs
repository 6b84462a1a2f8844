//! Configuration management for contactbook.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "contactbook";

/// Default local slot file name.
const SLOT_FILE_NAME: &str = "contacts-db.json";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "contacts.db";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "CONTACTBOOK_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CONTACTBOOK_`, sections split on `__`)
/// 2. TOML config file at `~/.config/contactbook/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Change notification configuration.
    pub notify: NotifyConfig,
    /// Photo import configuration.
    pub photo: PhotoConfig,
}

/// Which persistence backend holds the contacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON slot file.
    #[default]
    Local,
    /// `SQLite` table with change events.
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use.
    pub backend: StorageBackend,
    /// Path to the local slot file.
    /// Defaults to `~/.local/share/contactbook/contacts-db.json`
    pub local_path: Option<PathBuf>,
    /// Path to the database file.
    /// Defaults to `~/.local/share/contactbook/contacts.db`
    pub database_path: Option<PathBuf>,
}

/// Change notification configuration (sqlite backend only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Subscribe to change events.
    pub enabled: bool,
    /// How often to check the database for commits from other processes.
    pub poll_interval_ms: u64,
    /// Buffered events per subscriber before it is considered lagging.
    pub channel_capacity: usize,
}

/// Photo import configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    /// Largest image file accepted, in bytes.
    pub max_bytes: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 1_000,
            channel_capacity: 64,
        }
    }
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            max_bytes: 2 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.notify.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "notify.poll_interval_ms must be greater than 0".to_string(),
            });
        }

        if self.notify.channel_capacity == 0 {
            return Err(Error::ConfigValidation {
                message: "notify.channel_capacity must be greater than 0".to_string(),
            });
        }

        if self.photo.max_bytes == 0 {
            return Err(Error::ConfigValidation {
                message: "photo.max_bytes must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the local slot path, resolving defaults if not set.
    #[must_use]
    pub fn local_path(&self) -> PathBuf {
        self.storage
            .local_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(SLOT_FILE_NAME))
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the external change check interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.notify.poll_interval_ms)
    }
}
