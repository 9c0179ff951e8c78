use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::SyncConfig;

/// Polling faster than this is treated as a misconfiguration.
const MIN_INTERVAL_MS: u64 = 100;
/// Upper bound for a debounce quiet period.
const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl SyncConfig {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/fleetsync/config.toml` on Unix/macOS,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("fleetsync").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// A missing file yields `SyncConfig::default()`.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Loads configuration from an explicit path.
    ///
    /// - If the file doesn't exist, returns `SyncConfig::default()`.
    /// - If the file exists, parses it as TOML and validates.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(SyncConfig::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: SyncConfig = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - The poll interval is 0 (disabled) or at least 100 ms
    /// - The debounce delay is below one minute
    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.poller.interval_ms;
        if interval != 0 && interval < MIN_INTERVAL_MS {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "poller.interval_ms must be 0 or at least {} (got {})",
                    MIN_INTERVAL_MS, interval
                ),
            });
        }

        if self.debounce.delay_ms >= MAX_DEBOUNCE_MS {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "debounce.delay_ms must be below {} (got {})",
                    MAX_DEBOUNCE_MS, self.debounce.delay_ms
                ),
            });
        }

        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
