//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/execmem/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/execmem/` (~/.config/execmem/)
//! - Data: `$XDG_DATA_HOME/execmem/` (~/.local/share/execmem/)
//! - State/Logs: `$XDG_STATE_HOME/execmem/` (~/.local/state/execmem/)

use crate::error::{Error, Result};
use crate::scoring::{WeightUpdate, Weights};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "execmem";

/// `$HOME`, falling back to the platform home directory.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// An XDG base directory: the env var when set and non-empty, else `~/<fallback>`.
fn xdg_dir(var: &str, fallback: &str) -> PathBuf {
    std::env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(fallback))
}

/// Settings read from `config.toml`. Every section is optional.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Storage location and retention
    #[serde(default)]
    pub storage: StorageConfig,

    /// Search limits
    #[serde(default)]
    pub search: SearchConfig,

    /// Relevance scoring weights
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Override for the database file location
    pub database_path: Option<PathBuf>,

    /// Executions older than this many days are removed by `cleanup`
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

/// Search configuration
#[derive(Debug, Deserialize)]
pub struct SearchConfig {
    /// Results returned when the caller does not ask for a limit
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Text matches fetched before re-ranking
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            candidate_limit: default_candidate_limit(),
        }
    }
}

fn default_search_limit() -> usize {
    10
}

fn default_candidate_limit() -> usize {
    50
}

/// Scoring configuration
#[derive(Debug, Deserialize, Default)]
pub struct ScoringConfig {
    /// Partial weight map merged over the defaults
    #[serde(default)]
    pub weights: WeightUpdate,
}

impl ScoringConfig {
    /// Effective weights: defaults with the configured overrides merged in.
    pub fn effective_weights(&self) -> Result<Weights> {
        Weights::default().with_updates(&self.weights)
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
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
    /// Load `config.toml`, or defaults when there is none.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            return Self::load_from(&path);
        }

        tracing::info!(path = %path.display(), "No config file, using defaults");
        Ok(Config::default())
    }

    /// Load and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning an error describing the first problem
    pub fn validate(&self) -> Result<()> {
        if self.search.candidate_limit == 0 {
            return Err(Error::Config(
                "search.candidate_limit must be at least 1".to_string(),
            ));
        }
        self.scoring
            .effective_weights()
            .map_err(|e| Error::Config(format!("scoring.weights: {}", e)))?;
        Ok(())
    }

    /// Database path honoring the `storage.database_path` override
    pub fn resolved_database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// `$XDG_CONFIG_HOME/execmem/config.toml`
    pub fn config_path() -> PathBuf {
        xdg_dir("XDG_CONFIG_HOME", ".config")
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Where the execution store lives: `$XDG_DATA_HOME/execmem/`
    pub fn data_dir() -> PathBuf {
        xdg_dir("XDG_DATA_HOME", ".local/share").join(APP_DIR)
    }

    /// Where logs go: `$XDG_STATE_HOME/execmem/`
    pub fn state_dir() -> PathBuf {
        xdg_dir("XDG_STATE_HOME", ".local/state").join(APP_DIR)
    }

    /// Default store location, `executions.db` in [`Config::data_dir`]
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("executions.db")
    }

    /// Current log file, `execmem.log` in [`Config::state_dir`]
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("execmem.log")
    }
}
