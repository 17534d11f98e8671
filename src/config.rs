//! # Configuration Management
//!
//! Centralized configuration for the fernq client.
//!
//! This module provides structured configuration for the connection client
//! (deadlines, queue sizing, frame limits) and for logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Timing
//! - The 5 second read deadline is the polling interval that keeps cancellation responsive
//! - The 3 minute handshake ceiling bounds how long `connect` may wait for a verdict

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// URL scheme accepted by `connect`
pub const URL_SCHEME: &str = "fernq";

/// Port used when the connection URL does not name one
pub const DEFAULT_PORT: u16 = 9147;

/// Fixed frame header: u32 total length + u16 type code
pub const FRAME_HEADER_LEN: usize = 6;

/// Max allowed frame size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Capacity of the inbound delivery queue
pub const DELIVERY_CAPACITY: usize = 1024;

/// Scratch read size for each socket read
pub const READ_BUFFER_SIZE: usize = 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FernqConfig {
    /// Client connection settings
    #[serde(default)]
    pub client: ClientConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FernqConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(deadline) = std::env::var("FERNQ_READ_DEADLINE_MS") {
            if let Ok(val) = deadline.parse::<u64>() {
                config.client.read_deadline = Duration::from_millis(val);
            }
        }

        if let Ok(ceiling) = std::env::var("FERNQ_HANDSHAKE_TIMEOUT_MS") {
            if let Ok(val) = ceiling.parse::<u64>() {
                config.client.handshake_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(capacity) = std::env::var("FERNQ_DELIVERY_CAPACITY") {
            if let Ok(val) = capacity.parse::<usize>() {
                config.client.delivery_capacity = val;
            }
        }

        if let Ok(size) = std::env::var("FERNQ_READ_BUFFER_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.client.read_buffer_size = val;
            }
        }

        if let Ok(level) = std::env::var("FERNQ_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                config.logging.log_level = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Rolling deadline applied to every socket read
    #[serde(with = "duration_serde")]
    pub read_deadline: Duration,

    /// Absolute ceiling for the verification handshake
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,

    /// Number of undelivered messages buffered before the read loop waits
    pub delivery_capacity: usize,

    /// Bytes requested from the socket per read
    pub read_buffer_size: usize,

    /// Largest frame accepted from the relay
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_deadline: timeout::READ_DEADLINE,
            handshake_timeout: timeout::HANDSHAKE_TIMEOUT,
            delivery_capacity: DELIVERY_CAPACITY,
            read_buffer_size: READ_BUFFER_SIZE,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.read_deadline.as_millis() < 100 {
            errors.push("Read deadline too short (minimum: 100ms)".to_string());
        } else if self.read_deadline.as_secs() > 60 {
            errors.push("Read deadline too long (maximum: 60s)".to_string());
        }

        if self.handshake_timeout.as_secs() < 1 {
            errors.push("Handshake timeout too short (minimum: 1s)".to_string());
        } else if self.handshake_timeout.as_secs() > 600 {
            errors.push("Handshake timeout too long (maximum: 600s)".to_string());
        }

        if self.handshake_timeout < self.read_deadline {
            errors.push("Handshake timeout cannot be shorter than the read deadline".to_string());
        }

        if self.delivery_capacity == 0 {
            errors.push("Delivery capacity must be greater than 0".to_string());
        } else if self.delivery_capacity > 1_000_000 {
            errors.push(format!(
                "Delivery capacity too large: {} (max recommended: 1,000,000)",
                self.delivery_capacity
            ));
        }

        if self.read_buffer_size < 64 {
            errors.push("Read buffer too small (minimum: 64 bytes)".to_string());
        }

        if self.max_frame_size < 1024 {
            errors.push("Max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max frame size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_frame_size
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("fernq"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
