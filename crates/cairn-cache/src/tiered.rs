//! Two-tier read-through/write-through cache.
//!
//! Reads go local layer first, then the shared layer; a shared hit is copied
//! into the local layer. Writes go to the shared layer first, so a value is
//! only considered cached once the shared write succeeded.
//!
//! `get_or_compute` runs at most one loader per key at a time within this
//! process. Callers racing on the same key wait for the first loader and
//! reuse its result. There is no cross-process single-flight; two processes
//! missing the same key at once may both run their loader.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use cairn_core::Codec;
use cairn_core::JsonCodec;
use cairn_core::KeyValueStore;
use cairn_core::constants::DEFAULT_LOCAL_CACHE_ENTRIES;
use dashmap::DashMap;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::warn;

use crate::error::CacheError;
use crate::error::LoaderError;
use crate::key::CacheKey;
use crate::local::LocalLayer;
use crate::shared::SharedLayer;
use crate::stats::CacheStats;
use crate::stats::CacheStatsSnapshot;

/// Configuration for a tiered cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Prefix for shared-layer keys; also the scope of [`TieredCache::clear`].
    #[serde(default = "default_cache_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_max_local_entries")]
    pub max_local_entries: u64,
    /// TTL applied when a write does not name one. Zero means no expiry.
    #[serde(default)]
    pub default_ttl_ms: u64,
    /// Upper bound on how long the local layer keeps an entry, regardless of
    /// its shared TTL. Bounds staleness after writes from other processes.
    #[serde(default)]
    pub local_ttl_ms: Option<u64>,
}

fn default_cache_prefix() -> String {
    "cache:".to_string()
}

fn default_max_local_entries() -> u64 {
    DEFAULT_LOCAL_CACHE_ENTRIES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_cache_prefix(),
            max_local_entries: DEFAULT_LOCAL_CACHE_ENTRIES,
            default_ttl_ms: 0,
            local_ttl_ms: None,
        }
    }
}

/// A value produced by a loader, optionally with its own TTL.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<V> {
    pub value: V,
    /// `None` falls back to the cache's default TTL.
    pub ttl: Option<Duration>,
}

impl<V> Loaded<V> {
    pub fn new(value: V) -> Self {
        Self { value, ttl: None }
    }

    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        Self { value, ttl: Some(ttl) }
    }
}

/// Two-tier cache of `V` values.
///
/// TTL arguments follow one rule throughout: `None` means "use
/// `default_ttl_ms`", and a zero duration (or a zero default) means the
/// entry does not expire.
///
/// To cache absence, use `V = Option<T>`: `get` then returns `Some(None)`
/// for a cached null and `None` for no entry.
pub struct TieredCache<V, S: KeyValueStore + ?Sized + 'static = dyn KeyValueStore, C = JsonCodec> {
    config: CacheConfig,
    local: LocalLayer<V>,
    shared: SharedLayer<S>,
    codec: C,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    stats: CacheStats,
    _marker: PhantomData<fn() -> V>,
}

impl<V, S, C> TieredCache<V, S, C>
where
    V: Clone + Send + Sync + 'static,
    S: KeyValueStore + ?Sized + 'static,
    C: Codec<V> + Default,
{
    pub fn new(shared: SharedLayer<S>, config: CacheConfig) -> Self {
        Self::with_codec(shared, C::default(), config)
    }
}

impl<V, S, C> TieredCache<V, S, C>
where
    V: Clone + Send + Sync + 'static,
    S: KeyValueStore + ?Sized + 'static,
    C: Codec<V>,
{
    pub fn with_codec(shared: SharedLayer<S>, codec: C, config: CacheConfig) -> Self {
        Self {
            local: LocalLayer::new(config.max_local_entries),
            shared,
            codec,
            in_flight: DashMap::new(),
            stats: CacheStats::default(),
            config,
            _marker: PhantomData,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether this cache runs without a shared layer.
    pub fn is_local_only(&self) -> bool {
        self.shared.is_noop()
    }

    fn full_key<K: CacheKey + ?Sized>(&self, key: &K) -> Result<(String, String), CacheError> {
        let cache_key = key.cache_key();
        if cache_key.is_empty() {
            return Err(CacheError::InvalidKey {
                reason: "cache key must not be empty".to_string(),
            });
        }
        let full = format!("{}{}", self.config.key_prefix, cache_key);
        Ok((cache_key, full))
    }

    /// Resolve a caller TTL to the stored TTL (`None` = no expiry).
    fn resolve_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        non_zero(ttl.unwrap_or(Duration::from_millis(self.config.default_ttl_ms)))
    }

    fn local_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        let cap = self.config.local_ttl_ms.map(Duration::from_millis).and_then(non_zero);
        match (ttl, cap) {
            (Some(ttl), Some(cap)) => Some(ttl.min(cap)),
            (ttl, cap) => ttl.or(cap),
        }
    }

    /// Look `key` up in both layers.
    ///
    /// A malformed shared payload fails this key only.
    pub async fn get<K: CacheKey + ?Sized>(&self, key: &K) -> Result<Option<V>, CacheError> {
        let (_, full) = self.full_key(key)?;
        let found = self.lookup(&full).await?;
        if found.is_none() {
            self.stats.record_miss();
        }
        Ok(found)
    }

    async fn lookup(&self, full: &str) -> Result<Option<V>, CacheError> {
        if let Some(value) = self.local.get(full).await {
            self.stats.record_local_hit();
            return Ok(Some(value));
        }

        let Some(entry) = self.shared.get(full).await? else {
            return Ok(None);
        };
        let value = self.codec.decode(&entry.raw).map_err(|source| CacheError::Codec {
            key: full.to_string(),
            source,
        })?;

        let ttl = entry.ttl_remaining.or_else(|| self.resolve_ttl(None));
        self.local.insert(full, value.clone(), self.local_ttl(ttl)).await;
        self.stats.record_shared_hit();
        debug!(key = %full, ttl_ms = ttl.map(|t| t.as_millis() as u64), "hydrated local cache layer");
        Ok(Some(value))
    }

    /// Store `value` in both layers.
    ///
    /// A shared-layer failure is returned and the local layer is left
    /// untouched.
    pub async fn put<K: CacheKey + ?Sized>(&self, key: &K, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let (_, full) = self.full_key(key)?;
        self.store_value(&full, value, ttl).await
    }

    async fn store_value(&self, full: &str, value: V, ttl: Option<Duration>) -> Result<(), CacheError> {
        let ttl = self.resolve_ttl(ttl);
        let raw = self.codec.encode(&value).map_err(|source| CacheError::Codec {
            key: full.to_string(),
            source,
        })?;

        if let Err(e) = self.shared.put(full, raw, ttl).await {
            self.stats.record_shared_write_failure();
            warn!(key = %full, error = %e, "shared cache write failed");
            return Err(e.into());
        }
        self.local.insert(full, value, self.local_ttl(ttl)).await;
        Ok(())
    }

    /// Return the cached value, or run `loader` once and cache its result.
    pub async fn get_or_compute<K, F, Fut, E>(&self, key: &K, loader: F, ttl: Option<Duration>) -> Result<V, CacheError>
    where
        K: CacheKey + ?Sized,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Into<LoaderError>,
    {
        self.get_or_compute_with_ttl(key, move |k| {
            let load = loader(k);
            async move {
                load.await.map(|value| Loaded { value, ttl })
            }
        })
        .await
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but the loader picks
    /// the TTL for the value it produces.
    ///
    /// Loader errors are returned to the caller that ran the loader and are
    /// not cached; the next caller tries again.
    pub async fn get_or_compute_with_ttl<K, F, Fut, E>(&self, key: &K, loader: F) -> Result<V, CacheError>
    where
        K: CacheKey + ?Sized,
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Loaded<V>, E>>,
        E: Into<LoaderError>,
    {
        let (cache_key, full) = self.full_key(key)?;
        if let Some(value) = self.lookup(&full).await? {
            return Ok(value);
        }
        self.stats.record_miss();

        let flight = InFlight::join(&self.in_flight, &full);
        let _held = flight.lock.lock().await;

        // Whoever held the key lock before us may have filled it.
        if let Some(value) = self.lookup(&full).await? {
            return Ok(value);
        }

        self.stats.record_loader_call();
        debug!(key = %full, "running cache loader");
        let loaded = loader(cache_key).await.map_err(|e| CacheError::Loader {
            key: full.clone(),
            source: e.into(),
        })?;

        self.store_value(&full, loaded.value.clone(), loaded.ttl).await?;
        Ok(loaded.value)
    }

    /// Drop `key` from the local layer only.
    pub async fn invalidate<K: CacheKey + ?Sized>(&self, key: &K) -> Result<(), CacheError> {
        let (_, full) = self.full_key(key)?;
        self.local.invalidate(&full).await;
        Ok(())
    }

    /// Empty the local layer. The shared layer is not touched; use
    /// [`clear`](Self::clear) for that.
    pub fn invalidate_all(&self) {
        self.local.invalidate_all();
    }

    /// Remove `key` from both layers.
    pub async fn remove<K: CacheKey + ?Sized>(&self, key: &K) -> Result<bool, CacheError> {
        let (_, full) = self.full_key(key)?;
        let removed = self.shared.remove(&full).await?;
        self.local.invalidate(&full).await;
        Ok(removed)
    }

    /// Remove every entry under this cache's prefix from both layers.
    pub async fn clear(&self) -> Result<u32, CacheError> {
        if self.config.key_prefix.is_empty() {
            return Err(CacheError::InvalidKey {
                reason: "refusing to clear a cache without a key prefix".to_string(),
            });
        }
        let removed = self.shared.clear_prefix(&self.config.key_prefix).await?;
        self.local.invalidate_all();
        debug!(prefix = %self.config.key_prefix, removed, "cache cleared");
        Ok(removed)
    }

    /// Approximate number of entries in the local layer.
    pub async fn local_entry_count(&self) -> u64 {
        self.local.run_pending_tasks().await;
        self.local.entry_count()
    }
}

fn non_zero(ttl: Duration) -> Option<Duration> {
    (!ttl.is_zero()).then_some(ttl)
}

/// Membership in a key's single-flight group.
///
/// The map entry is removed when the last member leaves.
struct InFlight<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
    lock: Arc<Mutex<()>>,
}

impl<'a> InFlight<'a> {
    fn join(map: &'a DashMap<String, Arc<Mutex<()>>>, key: &'a str) -> Self {
        let lock = map.entry(key.to_string()).or_default().clone();
        Self { map, key, lock }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        // One reference in the map plus ours: nobody else is waiting.
        self.map.remove_if(self.key, |_, lock| Arc::strong_count(lock) == 2);
    }
}
