//! Engine configuration
//!
//! Loaded from a JSON file. Every field has a default, so an empty object
//! is a valid configuration. Values are validated once at load time.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Execution engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Page size when the caller does not pass a limit
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Largest page size a caller may request
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Candidate window is `limit * limit_multiplier` rows
    #[serde(default = "default_limit_multiplier")]
    pub limit_multiplier: usize,

    /// Granularity of the execution-rate window
    #[serde(default = "default_rate_limit_bucket_seconds")]
    pub rate_limit_bucket_seconds: u64,

    /// Smallest allowed `max_execution_duration_seconds`
    #[serde(default = "default_min_execution_duration")]
    pub min_execution_duration_seconds: u64,

    /// Largest allowed `max_execution_duration_seconds`
    #[serde(default = "default_max_execution_duration")]
    pub max_execution_duration_seconds: u64,

    /// Cursor tokens longer than this are rejected
    #[serde(default = "default_max_cursor_length")]
    pub max_cursor_length: usize,

    /// Whether the `debug` execution option is honoured
    #[serde(default)]
    pub debug_enabled: bool,

    /// Region used when a request does not name one
    #[serde(default)]
    pub region: Option<String>,
}

fn default_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    1500
}

fn default_limit_multiplier() -> usize {
    1
}

fn default_rate_limit_bucket_seconds() -> u64 {
    1
}

fn default_min_execution_duration() -> u64 {
    5
}

fn default_max_execution_duration() -> u64 {
    60
}

fn default_max_cursor_length() -> usize {
    4096
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            limit_multiplier: default_limit_multiplier(),
            rate_limit_bucket_seconds: default_rate_limit_bucket_seconds(),
            min_execution_duration_seconds: default_min_execution_duration(),
            max_execution_duration_seconds: default_max_execution_duration(),
            max_cursor_length: default_max_cursor_length(),
            debug_enabled: false,
            region: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[("path", &path.display().to_string())],
        );
        Ok(config)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_limit == 0 {
            return Err(ConfigError::Invalid("default_limit must be > 0".into()));
        }
        if self.max_limit < self.default_limit {
            return Err(ConfigError::Invalid(format!(
                "max_limit ({}) must be >= default_limit ({})",
                self.max_limit, self.default_limit
            )));
        }
        if self.limit_multiplier == 0 {
            return Err(ConfigError::Invalid("limit_multiplier must be > 0".into()));
        }
        if self.rate_limit_bucket_seconds == 0 {
            return Err(ConfigError::Invalid("rate_limit_bucket_seconds must be > 0".into()));
        }
        if self.min_execution_duration_seconds == 0
            || self.min_execution_duration_seconds > self.max_execution_duration_seconds
        {
            return Err(ConfigError::Invalid(format!(
                "execution duration bounds [{}, {}] are not ordered",
                self.min_execution_duration_seconds, self.max_execution_duration_seconds
            )));
        }
        if self.max_cursor_length == 0 {
            return Err(ConfigError::Invalid("max_cursor_length must be > 0".into()));
        }
        Ok(())
    }
}
