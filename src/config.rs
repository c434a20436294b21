//! Configuration management for viewlog

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::logging::{TraceLevel, DEFAULT_LOG_FILE, DEFAULT_ROTATION_THRESHOLD};

/// Logger settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Primary log file (default: ./logs/error.log)
    #[serde(default = "default_file_path")]
    pub file_path: PathBuf,

    /// Lowest level written (default: debug)
    #[serde(default)]
    pub minimum_level: TraceLevel,

    /// Primary size in bytes above which the view file is archived (default: 1000)
    #[serde(default = "default_rotation_threshold")]
    pub rotation_threshold_bytes: u64,
}

/// Static file server settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to serve on (default: 8100)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory to expose (default: ./logs)
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

/// Sample error loop run by the binary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoConfig {
    /// Seconds between sample records (default: 5)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Message written each tick
    #[serde(default = "default_message")]
    pub message: String,
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub demo: DemoConfig,
}

fn default_file_path() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

fn default_rotation_threshold() -> u64 {
    DEFAULT_ROTATION_THRESHOLD
}

fn default_port() -> u16 {
    8100
}

fn default_directory() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_interval_secs() -> u64 {
    5
}

fn default_message() -> String {
    "errodds----fdsfsd".to_string()
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            file_path: default_file_path(),
            minimum_level: TraceLevel::default(),
            rotation_threshold_bytes: default_rotation_threshold(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            directory: default_directory(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            message: default_message(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or return defaults if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path`, or return defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }
}

/// Get the base configuration directory (~/.viewlog)
/// Falls back to ./.viewlog if home directory cannot be determined
pub fn config_dir() -> PathBuf {
    try_config_dir().unwrap_or_else(|| {
        tracing::warn!("Could not determine home directory, using current directory for config");
        PathBuf::from(".viewlog")
    })
}

/// Try to get the base configuration directory, returning None if home dir is unavailable
pub fn try_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".viewlog"))
}

/// Get the path to the config file
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Create the directory holding the primary log file
///
/// The logger never creates directories itself; a missing parent makes every write fail.
pub fn ensure_log_directory(config: &LoggerConfig) -> Result<()> {
    if let Some(parent) = config.file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create log directory {}", parent.display())
            })?;
        }
    }
    Ok(())
}
