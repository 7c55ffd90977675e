//! Engine configuration.
//!
//! Read-only at runtime. Config is stored in `~/.config/relay/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`RELAY_LOG_LEVEL`, `RELAY_RETRY_BACKOFF`,
//!    `OPENAI_API_KEY`)
//! 2. Config file (`~/.config/relay/config.toml`)
//! 3. Defaults

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Log verbosity for the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    #[default]
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// The matching tracing level, for subscriber setup
    pub fn as_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Retry backoff strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Linear,
    #[default]
    Exponential,
}

impl std::str::FromStr for Backoff {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Backoff::Linear),
            "exponential" => Ok(Backoff::Exponential),
            other => Err(format!("unknown backoff strategy '{other}'")),
        }
    }
}

/// Process-wide engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Verbosity of pipeline lifecycle logging
    pub log_level: LogLevel,

    /// Retry bound used when a Retry outcome declares no `max_attempts`
    pub default_retry_attempts: u32,

    /// Backoff strategy between retry attempts
    pub retry_backoff: Backoff,

    /// Base delay for backoff calculation, in milliseconds
    pub retry_base_ms: u64,

    /// API key for the completion transport
    pub api_key: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Debug,
            default_retry_attempts: 3,
            retry_backoff: Backoff::Exponential,
            retry_base_ms: 1000,
            api_key: None,
        }
    }
}

impl EngineConfig {
    /// Get the config directory path
    ///
    /// Returns `~/.config/relay/` on Unix, `%APPDATA%/relay/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("relay")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error if the file exists but is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> Result<(), ConfigError> {
        let dir = Self::config_dir();
        let path = Self::config_path();

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| ConfigError::Write {
                reason: e.to_string(),
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Write {
            reason: e.to_string(),
        })?;

        fs::write(&path, content).map_err(|e| ConfigError::Write {
            reason: e.to_string(),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Self {
        if let Ok(level) = std::env::var("RELAY_LOG_LEVEL") {
            if let Ok(parsed) = level.parse() {
                self.log_level = parsed;
            }
        }
        if let Ok(backoff) = std::env::var("RELAY_RETRY_BACKOFF") {
            if let Ok(parsed) = backoff.parse() {
                self.retry_backoff = parsed;
            }
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        self
    }

    /// Base delay as a `Duration`
    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}
