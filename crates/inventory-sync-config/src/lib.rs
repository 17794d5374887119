//! Collector configuration.
//!
//! Values are resolved in order: built-in defaults, an optional TOML file,
//! then `INVENTORY_SYNC_*` environment variables.

use directories::ProjectDirs;
use inventory_sync_protocol::WaitOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_MAX_WAIT_SECONDS: &str = "INVENTORY_SYNC_MAX_WAIT_SECONDS";
pub const ENV_MAX_OBJECT_UPDATES: &str = "INVENTORY_SYNC_MAX_OBJECT_UPDATES";
pub const ENV_PARTIAL_UPDATES: &str = "INVENTORY_SYNC_PARTIAL_UPDATES";

const CONFIG_FILE_NAME: &str = "collector.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    Env { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for a collector run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Upper bound for a single long-poll (in seconds)
    pub max_wait_seconds: u32,
    /// Cap on object updates per update set; larger batches arrive truncated
    pub max_object_updates: Option<u32>,
    /// Ask the server for partial (changed-properties-only) updates
    pub partial_updates: bool,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_wait_seconds: 10,
            max_object_updates: None,
            partial_updates: true,
        }
    }
}

impl CollectorConfig {
    /// Load from the platform config directory if a file exists there,
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.with_env_overrides()
    }

    /// Parse a TOML file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded collector config");
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/inventory-sync/collector.toml` for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "inventory-sync")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Apply `INVENTORY_SYNC_*` environment variables on top of this config.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(value) = env_var(ENV_MAX_WAIT_SECONDS) {
            self.max_wait_seconds = value.parse().map_err(|_| ConfigError::Env {
                name: ENV_MAX_WAIT_SECONDS,
                value,
            })?;
        }
        if let Some(value) = env_var(ENV_MAX_OBJECT_UPDATES) {
            self.max_object_updates = match value.as_str() {
                "" | "none" => None,
                v => Some(v.parse().map_err(|_| ConfigError::Env {
                    name: ENV_MAX_OBJECT_UPDATES,
                    value: value.clone(),
                })?),
            };
        }
        if let Some(value) = env_var(ENV_PARTIAL_UPDATES) {
            self.partial_updates = match value.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Env {
                        name: ENV_PARTIAL_UPDATES,
                        value,
                    })
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_wait_seconds == 0 {
            return Err(ConfigError::Invalid(
                "max_wait_seconds must be greater than zero".to_string(),
            ));
        }
        if self.max_object_updates == Some(0) {
            return Err(ConfigError::Invalid(
                "max_object_updates must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Long-poll options derived from this config.
    pub fn wait_options(&self) -> WaitOptions {
        WaitOptions {
            max_wait_seconds: self.max_wait_seconds,
            max_object_updates: self.max_object_updates,
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
