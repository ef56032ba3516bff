//! # Store Configuration
//!
//! Connection and key-naming settings for the order store.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `ORDER_STORE_*` environment variables (a `.env` file is loaded first if
//! present).
//!
//! | Key                    | Env var                             | Default                  |
//! |------------------------|-------------------------------------|--------------------------|
//! | `redis_url`            | `ORDER_STORE_REDIS_URL`             | `redis://127.0.0.1:6379` |
//! | `key_prefix`           | `ORDER_STORE_KEY_PREFIX`            | `order`                  |
//! | `index_set`            | `ORDER_STORE_INDEX_SET`             | `orders`                 |
//! | `default_scan_count`   | `ORDER_STORE_DEFAULT_SCAN_COUNT`    | `10`                     |
//! | `operation_timeout_ms` | `ORDER_STORE_OPERATION_TIMEOUT_MS`  | `5000`                   |
//!
//! # Examples
//!
//! ```
//! use order_store::infrastructure::config::StoreConfig;
//!
//! let config = StoreConfig::default()
//!     .with_redis_url("redis://cache:6379")
//!     .with_operation_timeout_ms(250);
//! assert_eq!(config.redis_url(), "redis://cache:6379");
//! assert!(config.validate().is_ok());
//! ```

use crate::infrastructure::persistence::order_store::{
    DEFAULT_INDEX_SET, DEFAULT_KEY_PREFIX, DEFAULT_SCAN_COUNT,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default Redis URL.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default per-operation timeout in milliseconds.
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 5000;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "ORDER_STORE";

/// Configuration loading or validation failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates an invalid configuration error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Order store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    redis_url: String,
    key_prefix: String,
    index_set: String,
    default_scan_count: usize,
    operation_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            index_set: DEFAULT_INDEX_SET.to_string(),
            default_scan_count: DEFAULT_SCAN_COUNT,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Loads from `.env`, then the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable cannot be parsed or the result
    /// fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Loads from `.env`, an optional TOML file, then the environment.
    ///
    /// Environment variables override the file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is unreadable, a value cannot be
    /// parsed, or the result fails [`validate`](Self::validate).
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }

        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("redis_url", defaults.redis_url)?
            .set_default("key_prefix", defaults.key_prefix)?
            .set_default("index_set", defaults.index_set)?
            .set_default("default_scan_count", DEFAULT_SCAN_COUNT as i64)?
            .set_default("operation_timeout_ms", DEFAULT_OPERATION_TIMEOUT_MS as i64)?;
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.redis_url.trim().is_empty() {
            return Err(ConfigError::invalid("redis_url must not be empty"));
        }
        if self.key_prefix.is_empty() {
            return Err(ConfigError::invalid("key_prefix must not be empty"));
        }
        if self
            .key_prefix
            .chars()
            .any(|c| matches!(c, '*' | '?' | '[' | ']' | '\\'))
        {
            return Err(ConfigError::invalid(
                "key_prefix must not contain glob characters",
            ));
        }
        if self.index_set.is_empty() {
            return Err(ConfigError::invalid("index_set must not be empty"));
        }
        if self.index_set.starts_with(&format!("{}:", self.key_prefix)) {
            return Err(ConfigError::invalid(
                "index_set must not share the record key namespace",
            ));
        }
        if self.default_scan_count == 0 {
            return Err(ConfigError::invalid("default_scan_count must be positive"));
        }
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::invalid("operation_timeout_ms must be positive"));
        }
        Ok(())
    }

    /// Sets the Redis URL.
    #[must_use]
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Sets the record key prefix.
    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the index set name.
    #[must_use]
    pub fn with_index_set(mut self, name: impl Into<String>) -> Self {
        self.index_set = name.into();
        self
    }

    /// Sets the scan count used when a page has no limit.
    #[must_use]
    pub fn with_default_scan_count(mut self, count: usize) -> Self {
        self.default_scan_count = count;
        self
    }

    /// Sets the per-operation timeout.
    #[must_use]
    pub fn with_operation_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.operation_timeout_ms = timeout_ms;
        self
    }

    /// Redis URL.
    #[must_use]
    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    /// Record key prefix.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Index set name.
    #[must_use]
    pub fn index_set(&self) -> &str {
        &self.index_set
    }

    /// Scan count used when a page has no limit.
    #[must_use]
    pub fn default_scan_count(&self) -> usize {
        self.default_scan_count
    }

    /// Per-operation timeout in milliseconds.
    #[must_use]
    pub fn operation_timeout_ms(&self) -> u64 {
        self.operation_timeout_ms
    }

    /// Per-operation timeout.
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}
