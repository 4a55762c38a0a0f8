//! Configuration types for Tapedeck

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::matcher::MatcherKind;
use crate::network::{POOL_IDLE_TIMEOUT_SECS, POOL_MAX_IDLE_PER_HOST};
use crate::storage::CASSETTE_EXTENSION;
use crate::{Result, TapeError};

/// Operating mode, fixed when an interceptor is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Serve recorded interactions, perform and record the rest
    Record,
    /// Serve recorded interactions only
    Replay,
    /// Forward every call untouched
    #[serde(alias = "pass-through")]
    PassThrough,
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Operating mode
    pub mode: Mode,
    /// Directory holding cassette files
    pub cassette_dir: PathBuf,
    /// Request matcher
    #[serde(default)]
    pub matcher: MatcherKind,
    /// Real transport settings
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Settings for the real HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Runtime worker threads driving live calls
    pub worker_threads: usize,
    /// Idle pooled connection timeout
    pub pool_idle_timeout_secs: u64,
    /// Idle pooled connections kept per host
    pub pool_max_idle_per_host: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            pool_idle_timeout_secs: POOL_IDLE_TIMEOUT_SECS,
            pool_max_idle_per_host: POOL_MAX_IDLE_PER_HOST,
        }
    }
}

impl Config {
    /// Create a configuration with default matcher and upstream settings
    pub fn new(mode: Mode, cassette_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            cassette_dir: cassette_dir.into(),
            matcher: MatcherKind::default(),
            upstream: UpstreamConfig::default(),
        }
    }

    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TapeError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TapeError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.cassette_dir.as_os_str().is_empty() {
            return Err(TapeError::ConfigError(
                "cassette_dir cannot be empty".to_string(),
            ));
        }

        // Replay never creates files, so the directory must already be there
        if self.mode == Mode::Replay && !self.cassette_dir.is_dir() {
            return Err(TapeError::ConfigError(format!(
                "Cassette directory does not exist: {}",
                self.cassette_dir.display()
            )));
        }

        if self.upstream.worker_threads == 0 {
            return Err(TapeError::ConfigError(
                "upstream.worker_threads must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Path of the cassette file for a session name
    #[must_use]
    pub fn cassette_path(&self, name: &str) -> PathBuf {
        self.cassette_dir
            .join(format!("{name}.{CASSETTE_EXTENSION}"))
    }
}
