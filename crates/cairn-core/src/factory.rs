//! Backend selection.
//!
//! The backend is chosen once, at construction: no endpoint means an
//! in-process store, an endpoint means a networked one. Everything above this
//! module only sees `Arc<dyn KeyValueStore>`.

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use crate::constants::DEFAULT_CONNECT_TIMEOUT_MS;
use crate::error::KeyValueStoreError;
use crate::inmemory::DeterministicKeyValueStore;
use crate::traits::KeyValueStore;

/// Connection settings for the shared store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Store endpoint, e.g. `redis://127.0.0.1:6379`. `None` selects the
    /// in-memory backend.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Self::default()
        }
    }

    /// The backend this configuration selects.
    pub fn backend(&self) -> StoreBackend {
        match self.endpoint.as_deref() {
            None | Some("") => StoreBackend::InMemory,
            Some(_) => StoreBackend::Redis,
        }
    }
}

/// Which store implementation a [`StoreConfig`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    InMemory,
    Redis,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::InMemory => write!(f, "in-memory"),
            StoreBackend::Redis => write!(f, "redis"),
        }
    }
}

/// Build the store selected by `config`.
///
/// Connection failures surface here rather than on first use.
pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, KeyValueStoreError> {
    let backend = config.backend();
    match backend {
        StoreBackend::InMemory => {
            info!(backend = %backend, "selected key-value store backend");
            Ok(DeterministicKeyValueStore::new())
        }
        StoreBackend::Redis => connect_redis(config).await,
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, KeyValueStoreError> {
    let endpoint = config.endpoint.as_deref().unwrap_or_default();
    let timeout = std::time::Duration::from_millis(config.connect_timeout_ms);
    let store = crate::redis_store::RedisKeyValueStore::connect(endpoint, timeout).await?;
    info!(
        backend = %StoreBackend::Redis,
        endpoint = %crate::redis_store::redact_endpoint(endpoint),
        "selected key-value store backend"
    );
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_config: &StoreConfig) -> Result<Arc<dyn KeyValueStore>, KeyValueStoreError> {
    Err(KeyValueStoreError::InvalidRequest {
        reason: "an endpoint was configured but cairn-core was built without the `redis` feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::ReadRequest;
    use crate::kv::WriteRequest;

    #[test]
    fn backend_selection() {
        assert_eq!(StoreConfig::in_memory().backend(), StoreBackend::InMemory);
        assert_eq!(StoreConfig::with_endpoint("").backend(), StoreBackend::InMemory);
        assert_eq!(StoreConfig::with_endpoint("redis://localhost").backend(), StoreBackend::Redis);
    }

    #[test]
    fn config_defaults_from_empty_json() {
        let config: StoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    }

    #[tokio::test]
    async fn in_memory_store_is_usable() {
        let store = connect_store(&StoreConfig::in_memory()).await.unwrap();
        store.write(WriteRequest::set("k", "v")).await.unwrap();
        assert_eq!(store.read(ReadRequest::new("k")).await.unwrap().value, "v");
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn unreachable_endpoint_fails_at_startup() {
        let mut config = StoreConfig::with_endpoint("redis://127.0.0.1:1");
        config.connect_timeout_ms = 500;
        let err = connect_store(&config).await.err().unwrap();
        assert!(err.is_connectivity(), "unexpected error: {err}");
    }
}
