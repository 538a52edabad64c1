//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! for EdgeUnified hosts.
//!
//! # Usage
//!
//! ```rust,no_run
//! use edge_common::config::{ConfigLoader, ConfigError, EdgeConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = EdgeConfig::load(Path::new("config.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{DEFAULT_IDLE_MS, DEFAULT_STORE_ROOT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Common configuration fields shared by every host.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "edge-node-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Persistence store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory backing the store.
    pub root: PathBuf,
    /// Create `root` on startup when it does not exist.
    pub create_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_STORE_ROOT),
            create_missing: true,
        }
    }
}

/// Event loop settings of the host binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Sleep between loop iterations in milliseconds.
    pub idle_ms: u64,
    /// Stop after this many ticks (0 = run until interrupted).
    pub max_ticks: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            idle_ms: DEFAULT_IDLE_MS,
            max_ticks: 0,
        }
    }
}

/// Blink driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    /// Simulated GPIO pin number.
    pub pin: u8,
    /// Toggle period in milliseconds.
    pub cycle_ms: u32,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self { pin: 2, cycle_ms: 500 }
    }
}

/// Publisher driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// Broker host name; empty disables publishing.
    pub server: String,
    /// Topic messages are published to.
    pub topic: String,
    /// Period between successful publishes in milliseconds.
    pub interval_ms: u32,
    /// Period between retries after a failed publish in milliseconds.
    pub retry_interval_ms: u32,
    /// Retries before falling back to the normal period.
    pub max_retries: u8,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            topic: "edge/telemetry".to_string(),
            interval_ms: 30_000,
            retry_interval_ms: 5_000,
            max_retries: 3,
        }
    }
}

/// Complete host configuration.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "edge-node-01"
///
/// [store]
/// root = "/var/lib/edge"
///
/// [event_loop]
/// idle_ms = 1
///
/// [blink]
/// pin = 2
/// cycle_ms = 500
///
/// [publisher]
/// server = "broker.local"
/// topic = "channels/1/publish"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeConfig {
    /// Common fields.
    pub shared: SharedConfig,
    /// Persistence store.
    #[serde(default)]
    pub store: StoreConfig,
    /// Event loop.
    #[serde(default)]
    pub event_loop: LoopConfig,
    /// Blink driver.
    #[serde(default)]
    pub blink: BlinkConfig,
    /// Publisher driver.
    #[serde(default)]
    pub publisher: PublisherConfig,
}

impl EdgeConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `shared.service_name` is empty
    /// - `blink.cycle_ms` is 0
    /// - `publisher.interval_ms` or `publisher.retry_interval_ms` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if self.blink.cycle_ms == 0 {
            return Err(ConfigError::ValidationError(
                "blink.cycle_ms must be greater than 0".to_string(),
            ));
        }
        if self.publisher.interval_ms == 0 || self.publisher.retry_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "publisher intervals must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
