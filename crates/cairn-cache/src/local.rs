//! Process-local cache layer.
//!
//! A bounded in-memory cache where every entry carries its own time-to-live.
//! `None` means the entry never expires; capacity eviction still applies.

use std::time::Duration;
use std::time::Instant;

use moka::Expiry;
use moka::future::Cache;

#[derive(Clone)]
struct LocalEntry<V> {
    value: V,
    ttl: Option<Duration>,
}

struct PerEntryTtl;

impl<V> Expiry<String, LocalEntry<V>> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &LocalEntry<V>, _created_at: Instant) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &LocalEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

pub(crate) struct LocalLayer<V> {
    cache: Cache<String, LocalEntry<V>>,
}

impl<V> LocalLayer<V>
where V: Clone + Send + Sync + 'static
{
    pub(crate) fn new(max_entries: u64) -> Self {
        let cache = Cache::builder().max_capacity(max_entries).expire_after(PerEntryTtl).build();
        Self { cache }
    }

    pub(crate) async fn get(&self, key: &str) -> Option<V> {
        self.cache.get(key).await.map(|entry| entry.value)
    }

    pub(crate) async fn insert(&self, key: &str, value: V, ttl: Option<Duration>) {
        self.cache.insert(key.to_string(), LocalEntry { value, ttl }).await;
    }

    pub(crate) async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    pub(crate) fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate; pending evictions are applied lazily.
    pub(crate) fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub(crate) async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_expire_individually() {
        let local = LocalLayer::new(100);
        local.insert("short", 1u32, Some(Duration::from_millis(30))).await;
        local.insert("forever", 2u32, None).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(local.get("short").await, None);
        assert_eq!(local.get("forever").await, Some(2));
    }

    #[tokio::test]
    async fn update_replaces_ttl() {
        let local = LocalLayer::new(100);
        local.insert("k", 1u32, Some(Duration::from_millis(30))).await;
        local.insert("k", 2u32, None).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(local.get("k").await, Some(2));
    }

    #[tokio::test]
    async fn capacity_is_bounded() {
        let local = LocalLayer::new(10);
        for i in 0..100u32 {
            local.insert(&format!("k{i}"), i, None).await;
        }
        local.run_pending_tasks().await;
        assert!(local.entry_count() <= 10);
    }

    #[tokio::test]
    async fn invalidation() {
        let local = LocalLayer::new(10);
        local.insert("a", 1u32, None).await;
        local.insert("b", 2u32, None).await;

        local.invalidate("a").await;
        assert_eq!(local.get("a").await, None);
        local.invalidate_all();
        assert_eq!(local.get("b").await, None);
    }
}
