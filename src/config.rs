//! Service configuration loaded from TOML
use super::matcher::MatchPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub storage: StorageConfig,
    pub matching: MatchingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: PathBuf,
    pub tree: String,
    /// Flush the shift table to disk after every committed transaction.
    pub flush_on_commit: bool,
    /// Open a throwaway database that is removed on drop.
    pub temporary: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub policy: MatchPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, `RUST_LOG` takes precedence when set.
    pub level: String,
    pub ansi: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("shifts.db"),
            tree: "shifts".to_string(),
            flush_on_commit: false,
            temporary: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.tree.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.tree must not be empty".into()));
        }
        if !self.storage.temporary && self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.path is required unless storage.temporary is set".into(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.level must not be empty".into()));
        }
        Ok(())
    }

    /// Opens the sled database described by the storage section.
    pub fn open_db(&self) -> Result<sled::Db, sled::Error> {
        let config = sled::Config::new();
        if self.storage.temporary {
            config.temporary(true).open()
        } else {
            config.path(&self.storage.path).open()
        }
    }
}
