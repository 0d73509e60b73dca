//! Configuration loading and management
//!
//! Everything ccanalysis keeps on disk lives under `~/.ccanalysis/`:
//! - Config: `~/.ccanalysis/config.toml` (optional)
//! - Database: `~/.ccanalysis/data.sqlite`
//! - Logs: `~/.ccanalysis/logs/`

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Name of the per-user application directory
const APP_DIR_NAME: &str = ".ccanalysis";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Application directory the config was resolved against
    #[serde(skip)]
    app_dir: Option<PathBuf>,
}

/// Storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Override for the database file location
    pub database_path: Option<PathBuf>,

    /// How long a writer waits on a locked database before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from `~/.ccanalysis/config.toml`
    pub fn load() -> Result<Self> {
        Self::load_in(Self::default_app_dir())
    }

    /// Load configuration rooted at an explicit application directory.
    ///
    /// A missing config file yields defaults.
    pub fn load_in(app_dir: PathBuf) -> Result<Self> {
        let config_path = app_dir.join("config.toml");

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::debug!(path = %config_path.display(), "No config file found, using defaults");
            Config::default()
        };

        config.app_dir = Some(app_dir);
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Defaults rooted at an explicit application directory
    pub fn with_app_dir(app_dir: PathBuf) -> Self {
        Self {
            app_dir: Some(app_dir),
            ..Default::default()
        }
    }

    /// `~/.ccanalysis`
    pub fn default_app_dir() -> PathBuf {
        home_dir().join(APP_DIR_NAME)
    }

    /// Application directory this config is rooted at
    pub fn app_dir(&self) -> PathBuf {
        self.app_dir
            .clone()
            .unwrap_or_else(Self::default_app_dir)
    }

    /// Returns the database file path
    ///
    /// `[storage] database_path` if set, else `~/.ccanalysis/data.sqlite`
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| self.app_dir().join("data.sqlite"))
    }

    /// Returns the log directory path
    pub fn log_dir(&self) -> PathBuf {
        self.app_dir().join("logs")
    }
}
