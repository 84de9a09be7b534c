//! Application configuration.
//!
//! Loaded from TOML with per-field defaults, then overlaid with environment
//! variables. Every primitive kind has a table of named instances:
//!
//! ```toml
//! [store]
//! endpoint = "redis://127.0.0.1:6379"
//!
//! [locks.jobs]
//! auto_expire_ms = 200
//! poll_interval_ms = 10
//!
//! [caches.users]
//! max_local_entries = 500
//! default_ttl_ms = 60000
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use cairn_cache::CacheConfig;
use cairn_coordination::CounterConfig;
use cairn_coordination::FutureConfig;
use cairn_coordination::LockConfig;
use cairn_coordination::RangeConfig;
use cairn_core::StoreConfig;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Overrides `store.endpoint`. An empty value selects the in-memory store.
pub const STORE_ENDPOINT_ENV: &str = "CAIRN_STORE_ENDPOINT";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub locks: HashMap<String, LockConfig>,
    pub caches: HashMap<String, CacheConfig>,
    pub counters: HashMap<String, CounterConfig>,
    pub futures: HashMap<String, FutureConfig>,
    pub ranges: HashMap<String, RangeConfig>,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Defaults, overlaid with `path` when given, overlaid with the
    /// environment; validated.
    pub fn load_with_optional_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup(STORE_ENDPOINT_ENV) {
            let endpoint = endpoint.trim();
            self.store.endpoint = (!endpoint.is_empty()).then(|| endpoint.to_string());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.connect_timeout_ms == 0 {
            return Err(invalid("store.connect_timeout_ms", "must be non-zero"));
        }

        for (name, lock) in &self.locks {
            if lock.auto_expire_ms == 0 {
                return Err(invalid(format!("locks.{name}.auto_expire_ms"), "must be non-zero"));
            }
            if lock.poll_interval_ms == 0 {
                return Err(invalid(format!("locks.{name}.poll_interval_ms"), "must be non-zero"));
            }
        }

        for (name, cache) in &self.caches {
            if cache.max_local_entries == 0 {
                return Err(invalid(format!("caches.{name}.max_local_entries"), "must be non-zero"));
            }
            if cache.key_prefix.is_empty() {
                return Err(invalid(format!("caches.{name}.key_prefix"), "must not be empty"));
            }
        }

        for (name, future) in &self.futures {
            if future.poll_interval_ms == 0 {
                return Err(invalid(format!("futures.{name}.poll_interval_ms"), "must be non-zero"));
            }
        }

        for (name, range) in &self.ranges {
            if range.max_batch == 0 {
                return Err(invalid(format!("ranges.{name}.max_batch"), "must be non-zero"));
            }
        }

        Ok(())
    }
}

fn invalid(key: impl Into<String>, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        reason: reason.to_string(),
    }
}

/// Configuration loading and parsing errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse TOML config{}: {source}", path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
    Parse {
        path: Option<PathBuf>,
        source: toml::de::Error,
    },

    #[error("invalid configuration for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}
