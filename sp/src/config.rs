//! Syncpane configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coordinator::CoordinatorConfig;
use crate::peer::PeerConfig;

/// Main syncpane configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage locations
    pub storage: StorageConfig,

    /// Coordinator behavior
    pub coordinator: CoordinatorConfig,

    /// Per-surface agent timing
    pub peer: PeerConfig,

    /// Log level when not set on the command line
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the persistent store
    #[serde(rename = "store-dir")]
    pub store_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("syncpane")
                .join("store"),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .syncpane.yml
        let local_config = PathBuf::from(".syncpane.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/syncpane/syncpane.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("syncpane").join("syncpane.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load only the log level, for early logging setup
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
