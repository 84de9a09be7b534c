//! Wiring from [`AppConfig`] to ready-to-use primitives.
//!
//! The store backend is selected once in [`Coordinator::connect`]; every
//! primitive handed out afterwards shares that store.
//!
//! Named instances resolve their config from the matching `AppConfig` table.
//! Unless a section sets its own `key_prefix`, keys are scoped as
//! `<kind>:<name>:` so two instances of the same kind never share keys.
//! Unknown names get the kind's defaults with the same scoping.
//!
//! Caches only get a shared layer when the store is a networked one. With
//! the in-process store there is nothing to share, so caches run
//! local-only and stay bounded by `max_local_entries`.

use std::sync::Arc;

use cairn_cache::CacheConfig;
use cairn_cache::SharedLayer;
use cairn_cache::TieredCache;
use cairn_coordination::CoordinationError;
use cairn_coordination::CounterConfig;
use cairn_coordination::CounterStore;
use cairn_coordination::FutureConfig;
use cairn_coordination::FutureStore;
use cairn_coordination::LockConfig;
use cairn_coordination::LockManager;
use cairn_coordination::RangeConfig;
use cairn_coordination::RangeStore;
use cairn_core::KeyValueStore;
use cairn_core::KeyValueStoreError;
use cairn_core::StoreBackend;
use cairn_core::connect_store;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to the shared store: {0}")]
    Store(#[from] KeyValueStoreError),
}

/// Entry point owning the shared store and the application config.
#[derive(Clone)]
pub struct Coordinator {
    config: Arc<AppConfig>,
    store: Arc<dyn KeyValueStore>,
    share_caches: bool,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").field("backend", &self.config.store.backend()).finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Validate `config` and connect to the store it selects.
    pub async fn connect(config: AppConfig) -> Result<Self, CoordinatorError> {
        config.validate()?;
        let store = connect_store(&config.store).await?;
        info!(
            backend = %config.store.backend(),
            locks = config.locks.len(),
            caches = config.caches.len(),
            futures = config.futures.len(),
            "coordinator ready"
        );
        let share_caches = config.store.backend() != StoreBackend::InMemory;
        Ok(Self {
            config: Arc::new(config),
            store,
            share_caches,
        })
    }

    /// Use an already-built store. `config.store` is ignored and caches
    /// always use `store` as their shared layer.
    pub fn with_store(config: AppConfig, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            share_caches: true,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    pub fn lock_manager(&self, name: &str) -> LockManager {
        let mut config = self.config.locks.get(name).cloned().unwrap_or_default();
        config.key_prefix = scoped_prefix(config.key_prefix, &LockConfig::default().key_prefix, name);
        LockManager::new(self.store.clone(), config)
    }

    pub fn cache<V>(&self, name: &str) -> TieredCache<V>
    where V: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
        let mut config = self.config.caches.get(name).cloned().unwrap_or_default();
        config.key_prefix = scoped_prefix(config.key_prefix, &CacheConfig::default().key_prefix, name);
        let shared = match self.share_caches {
            true => SharedLayer::Store(self.store.clone()),
            false => SharedLayer::NoOp,
        };
        TieredCache::new(shared, config)
    }

    pub fn counters(&self, name: &str) -> CounterStore {
        let mut config = self.config.counters.get(name).cloned().unwrap_or_default();
        config.key_prefix = scoped_prefix(config.key_prefix, &CounterConfig::default().key_prefix, name);
        CounterStore::new(self.store.clone(), config)
    }

    pub fn futures<T>(&self, name: &str) -> FutureStore<T>
    where T: Serialize + DeserializeOwned + Send + 'static {
        let mut config = self.config.futures.get(name).cloned().unwrap_or_default();
        config.key_prefix = scoped_prefix(config.key_prefix, &FutureConfig::default().key_prefix, name);
        FutureStore::new(self.store.clone(), config)
    }

    /// The range set called `name`. The set name is the key suffix, so no
    /// extra scoping applies.
    pub fn range(&self, name: &str) -> Result<RangeStore, CoordinationError> {
        let config = self.config.ranges.get(name).cloned().unwrap_or_else(RangeConfig::default);
        RangeStore::new(self.store.clone(), name, config)
    }
}

fn scoped_prefix(configured: String, default: &str, name: &str) -> String {
    if configured == default {
        format!("{default}{name}:")
    } else {
        configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoping() {
        assert_eq!(scoped_prefix("lock:".into(), "lock:", "jobs"), "lock:jobs:");
        assert_eq!(scoped_prefix("custom/".into(), "lock:", "jobs"), "custom/");
    }

    #[tokio::test]
    async fn unknown_names_get_scoped_defaults() {
        let coordinator = Coordinator::connect(AppConfig::default()).await.unwrap();
        assert_eq!(coordinator.lock_manager("jobs").config().key_prefix, "lock:jobs:");
        assert_eq!(coordinator.cache::<u32>("users").config().key_prefix, "cache:users:");
        assert_eq!(coordinator.futures::<u32>("reports").config().key_prefix, "future:reports:");
        assert_eq!(coordinator.lock_manager("jobs").config().auto_expire_ms, LockConfig::default().auto_expire_ms);
    }

    #[tokio::test]
    async fn in_memory_backend_gives_bounded_local_only_caches() {
        let mut config = AppConfig::default();
        config.caches.insert(
            "users".into(),
            CacheConfig {
                max_local_entries: 10,
                ..Default::default()
            },
        );
        let coordinator = Coordinator::connect(config).await.unwrap();
        let cache = coordinator.cache::<u32>("users");
        assert!(cache.is_local_only());

        for i in 0..1000u32 {
            cache.put(&i, i, None).await.unwrap();
        }
        let stored = coordinator
            .store()
            .scan(cairn_core::ScanRequest::prefix("cache:"))
            .await
            .unwrap();
        assert!(stored.entries.is_empty());
        assert!(cache.local_entry_count().await <= 10);
    }

    #[test]
    fn explicit_store_is_shared_by_caches() {
        let store: Arc<dyn KeyValueStore> = cairn_core::DeterministicKeyValueStore::new();
        let coordinator = Coordinator::with_store(AppConfig::default(), store);
        assert!(!coordinator.cache::<u32>("users").is_local_only());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_connecting() {
        let mut config = AppConfig::default();
        config.locks.insert(
            "jobs".into(),
            LockConfig {
                poll_interval_ms: 0,
                ..Default::default()
            },
        );
        let err = Coordinator::connect(config).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Config(_)));
    }
}
