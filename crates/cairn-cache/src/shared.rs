//! Shared cache layer.
//!
//! The shared layer is the cross-process source of truth. When no store is
//! configured the cache runs with [`SharedLayer::NoOp`], which always misses
//! and accepts every write, so the cache degrades to local-only operation
//! without errors.

use std::sync::Arc;
use std::time::Duration;

use cairn_core::DeleteRequest;
use cairn_core::KeyValueStore;
use cairn_core::KeyValueStoreError;
use cairn_core::ReadRequest;
use cairn_core::WriteRequest;

/// Value read from the shared layer with its remaining lifetime, if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedEntry {
    pub raw: String,
    pub ttl_remaining: Option<Duration>,
}

pub enum SharedLayer<S: KeyValueStore + ?Sized = dyn KeyValueStore> {
    Store(Arc<S>),
    NoOp,
}

impl<S: KeyValueStore + ?Sized> Clone for SharedLayer<S> {
    fn clone(&self) -> Self {
        match self {
            SharedLayer::Store(store) => SharedLayer::Store(store.clone()),
            SharedLayer::NoOp => SharedLayer::NoOp,
        }
    }
}

impl<S: KeyValueStore + ?Sized> std::fmt::Debug for SharedLayer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SharedLayer::Store(_) => f.write_str("SharedLayer::Store"),
            SharedLayer::NoOp => f.write_str("SharedLayer::NoOp"),
        }
    }
}

impl<S: KeyValueStore + ?Sized> SharedLayer<S> {
    /// `Store` when a store is configured, `NoOp` otherwise.
    pub fn from_store(store: Option<Arc<S>>) -> Self {
        match store {
            Some(store) => SharedLayer::Store(store),
            None => SharedLayer::NoOp,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, SharedLayer::NoOp)
    }

    pub async fn get(&self, key: &str) -> Result<Option<SharedEntry>, KeyValueStoreError> {
        let SharedLayer::Store(store) = self else {
            return Ok(None);
        };
        match store.read(ReadRequest::new(key)).await {
            Ok(result) => Ok(Some(SharedEntry {
                raw: result.value,
                ttl_remaining: result.ttl_remaining_ms.map(Duration::from_millis),
            })),
            Err(KeyValueStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write `raw` under `key`. `ttl` of `None` stores without expiry.
    pub async fn put(&self, key: &str, raw: String, ttl: Option<Duration>) -> Result<(), KeyValueStoreError> {
        let SharedLayer::Store(store) = self else {
            return Ok(());
        };
        let ttl_ms = ttl.map(|t| (t.as_millis() as u64).max(1)).unwrap_or(0);
        store.write(WriteRequest::set_with_ttl(key, raw, ttl_ms)).await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<bool, KeyValueStoreError> {
        let SharedLayer::Store(store) = self else {
            return Ok(false);
        };
        Ok(store.delete(DeleteRequest::new(key)).await?.is_deleted)
    }

    /// Delete every key under `prefix`; returns how many were removed.
    pub async fn clear_prefix(&self, prefix: &str) -> Result<u32, KeyValueStoreError> {
        let SharedLayer::Store(store) = self else {
            return Ok(0);
        };
        let result = store.write(WriteRequest::delete_prefix(prefix)).await?;
        Ok(result.keys_deleted.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use cairn_core::DeterministicKeyValueStore;

    use super::*;

    #[tokio::test]
    async fn noop_layer_misses_and_accepts_writes() {
        let layer: SharedLayer = SharedLayer::from_store(None);
        assert!(layer.is_noop());
        layer.put("k", "v".into(), None).await.unwrap();
        assert_eq!(layer.get("k").await.unwrap(), None);
        assert!(!layer.remove("k").await.unwrap());
        assert_eq!(layer.clear_prefix("cache:").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn store_layer_reports_remaining_ttl() {
        let layer = SharedLayer::from_store(Some(DeterministicKeyValueStore::new()));
        layer.put("k", "v".into(), Some(Duration::from_secs(10))).await.unwrap();
        layer.put("forever", "v".into(), None).await.unwrap();

        let entry = layer.get("k").await.unwrap().unwrap();
        assert_eq!(entry.raw, "v");
        assert!(entry.ttl_remaining.is_some_and(|t| t <= Duration::from_secs(10)));
        assert_eq!(layer.get("forever").await.unwrap().unwrap().ttl_remaining, None);

        assert!(layer.remove("k").await.unwrap());
        assert_eq!(layer.get("k").await.unwrap(), None);
    }
}
