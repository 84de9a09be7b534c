//! Named mutual-exclusion locks with automatic expiry.
//!
//! A lock is a single store entry `<prefix><name> = <owner id>` written with
//! set-if-absent and its expiry in the same command, so the entry can never
//! exist without a TTL. Release is an atomic compare-and-delete on the owner
//! id: a holder whose lock already expired and was taken over cannot delete
//! the new holder's entry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cairn_core::KeyValueStore;
use cairn_core::KeyValueStoreError;
use cairn_core::WriteRequest;
use cairn_core::constants::DEFAULT_LOCK_AUTO_EXPIRE_MS;
use cairn_core::constants::DEFAULT_LOCK_POLL_INTERVAL_MS;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;
use tracing::warn;

use crate::error::CoordinationError;
use crate::error::InvalidArgumentSnafu;
use crate::error::TimeoutSnafu;
use crate::error::ensure_non_empty;
use crate::types::effective_timeout;
use crate::types::now_unix_ms;

/// Configuration for a lock manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Prefix prepended to every lock name to form the store key.
    #[serde(default = "default_lock_prefix")]
    pub key_prefix: String,
    /// Time after which an unreleased lock frees itself.
    #[serde(default = "default_auto_expire_ms")]
    pub auto_expire_ms: u64,
    /// Wait between attempts in a blocking acquire.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_lock_prefix() -> String {
    "lock:".to_string()
}

fn default_auto_expire_ms() -> u64 {
    DEFAULT_LOCK_AUTO_EXPIRE_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_LOCK_POLL_INTERVAL_MS
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_lock_prefix(),
            auto_expire_ms: DEFAULT_LOCK_AUTO_EXPIRE_MS,
            poll_interval_ms: DEFAULT_LOCK_POLL_INTERVAL_MS,
        }
    }
}

/// Acquires and releases named locks against a shared store.
///
/// The manager itself is stateless apart from its configuration; one
/// instance can be shared freely between tasks.
pub struct LockManager<S: KeyValueStore + ?Sized + 'static = dyn KeyValueStore> {
    store: Arc<S>,
    config: LockConfig,
}

impl<S: KeyValueStore + ?Sized + 'static> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: KeyValueStore + ?Sized + 'static> LockManager<S> {
    pub fn new(store: Arc<S>, config: LockConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    fn lock_key(&self, name: &str) -> String {
        format!("{}{}", self.config.key_prefix, name)
    }

    /// Try to acquire `name` without waiting.
    ///
    /// Returns `Ok(None)` when another owner holds the lock. Store failures
    /// are errors, never "not acquired".
    pub async fn try_acquire(&self, name: &str) -> Result<Option<LockGuard<S>>, CoordinationError> {
        ensure_non_empty("lock name", name)?;
        // A zero TTL would be stored as "no expiry".
        if self.config.auto_expire_ms == 0 {
            return InvalidArgumentSnafu {
                reason: "lock auto_expire_ms must be non-zero",
            }
            .fail();
        }

        let key = self.lock_key(name);
        let owner_id = uuid::Uuid::new_v4().to_string();
        let result = self
            .store
            .write(WriteRequest::set_if_absent(&key, &owner_id, Some(self.config.auto_expire_ms)))
            .await?;

        if result.applied != Some(true) {
            debug!(key = %key, "lock held by another owner");
            return Ok(None);
        }

        let acquired_at_ms = now_unix_ms();
        debug!(
            key = %key,
            owner = %owner_id,
            ttl_ms = self.config.auto_expire_ms,
            "lock acquired"
        );
        Ok(Some(LockGuard {
            store: self.store.clone(),
            name: name.to_string(),
            key,
            owner_id,
            acquired_at_ms,
            expires_at_ms: acquired_at_ms.saturating_add(self.config.auto_expire_ms),
            is_released: false,
        }))
    }

    /// Acquire `name`, polling until it becomes free.
    ///
    /// `timeout` of `None` or zero waits indefinitely. Dropping the returned
    /// future abandons the wait; nothing is left registered in the store.
    pub async fn acquire(&self, name: &str, timeout: Option<Duration>) -> Result<LockGuard<S>, CoordinationError> {
        ensure_non_empty("lock name", name)?;

        let deadline = effective_timeout(timeout).map(|t| Instant::now() + t);
        let poll_ms = self.config.poll_interval_ms.max(1);

        loop {
            if let Some(guard) = self.try_acquire(name).await? {
                return Ok(guard);
            }

            // Jitter only shortens the wait, never past poll_interval.
            let jitter = rand::rng().random_range(0..=poll_ms / 4);
            let mut sleep = Duration::from_millis(poll_ms - jitter);

            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return TimeoutSnafu {
                        operation: format!("acquire lock '{name}'"),
                    }
                    .fail();
                }
                sleep = sleep.min(remaining);
            }

            tokio::time::sleep(sleep).await;
        }
    }

    /// Release `name` if it is still held by `owner_id`.
    ///
    /// Returns `false` without touching the store entry when the lock is
    /// absent or owned by someone else.
    pub(crate) async fn release(&self, name: &str, owner_id: &str) -> Result<bool, CoordinationError> {
        ensure_non_empty("lock name", name)?;
        Ok(release_if_owner(self.store.as_ref(), &self.lock_key(name), owner_id).await?)
    }

    /// Run `f` while holding `name`.
    ///
    /// The lock is released after `f` completes, whatever it returns. Use a
    /// `Result` output to carry failures out of the protected section.
    pub async fn with_lock<F, Fut, T>(&self, name: &str, timeout: Option<Duration>, f: F) -> Result<T, CoordinationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire(name, timeout).await?;
        let output = f().await;
        let key = guard.key.clone();
        match guard.release().await {
            Ok(true) => {}
            Ok(false) => warn!(key = %key, "lock expired before the protected section finished"),
            Err(e) => warn!(key = %key, error = %e, "lock release failed (will expire via TTL)"),
        }
        Ok(output)
    }
}

async fn release_if_owner<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
    owner_id: &str,
) -> Result<bool, KeyValueStoreError> {
    match store.write(WriteRequest::compare_and_delete(key, owner_id)).await {
        Ok(_) => {
            debug!(key = %key, owner = %owner_id, "lock released");
            Ok(true)
        }
        Err(KeyValueStoreError::CompareAndSwapFailed { actual, .. }) => {
            debug!(
                key = %key,
                owner = %owner_id,
                current_owner = actual.as_deref().unwrap_or("none"),
                "lock not released: no longer the owner"
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Handle to a held lock.
///
/// Dropping the guard without calling [`LockGuard::release`] spawns a
/// best-effort release on the current Tokio runtime; if there is none, the
/// lock simply expires.
pub struct LockGuard<S: KeyValueStore + ?Sized + 'static = dyn KeyValueStore> {
    store: Arc<S>,
    name: String,
    key: String,
    owner_id: String,
    acquired_at_ms: u64,
    expires_at_ms: u64,
    is_released: bool,
}

impl<S: KeyValueStore + ?Sized + 'static> LockGuard<S> {
    /// Lock name as passed to the manager.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Random token identifying this acquisition.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn acquired_at_ms(&self) -> u64 {
        self.acquired_at_ms
    }

    /// Unix ms at which the store drops the entry unless released first.
    pub fn expires_at_ms(&self) -> u64 {
        self.expires_at_ms
    }

    /// Release the lock.
    ///
    /// Returns `false` if the lock had already expired and possibly been
    /// taken by another owner; that owner's entry is left intact.
    pub async fn release(mut self) -> Result<bool, CoordinationError> {
        self.is_released = true;
        Ok(release_if_owner(self.store.as_ref(), &self.key, &self.owner_id).await?)
    }
}

impl<S: KeyValueStore + ?Sized + 'static> std::fmt::Debug for LockGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("owner_id", &self.owner_id)
            .field("expires_at_ms", &self.expires_at_ms)
            .finish()
    }
}

impl<S: KeyValueStore + ?Sized + 'static> Drop for LockGuard<S> {
    fn drop(&mut self) {
        if self.is_released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "lock guard dropped outside a runtime; lock will expire via TTL");
            return;
        };

        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let owner_id = std::mem::take(&mut self.owner_id);

        handle.spawn(async move {
            if let Err(e) = release_if_owner(store.as_ref(), &key, &owner_id).await {
                warn!(key = %key, error = %e, "lock release on drop failed (will expire via TTL)");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    use cairn_core::DeterministicKeyValueStore;
    use cairn_core::ReadRequest;

    use super::*;

    fn fast_config(auto_expire_ms: u64) -> LockConfig {
        LockConfig {
            auto_expire_ms,
            poll_interval_ms: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_try_acquire_and_release() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store.clone(), LockConfig::default());

        let guard = locks.try_acquire("orders").await.unwrap().unwrap();
        assert_eq!(guard.name(), "orders");
        assert!(guard.expires_at_ms() >= guard.acquired_at_ms() + DEFAULT_LOCK_AUTO_EXPIRE_MS);

        let stored = store.read(ReadRequest::new("lock:orders")).await.unwrap();
        assert_eq!(stored.value, guard.owner_id());

        assert!(guard.release().await.unwrap());
        assert!(store.read(ReadRequest::new("lock:orders")).await.is_err());
    }

    #[tokio::test]
    async fn test_contention_returns_none() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store, LockConfig::default());

        let _held = locks.try_acquire("orders").await.unwrap().unwrap();
        assert!(locks.try_acquire("orders").await.unwrap().is_none());
        assert!(locks.try_acquire("invoices").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_try_acquire_single_winner() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store, LockConfig::default());
        let winners = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let winners = winners.clone();
            handles.push(tokio::spawn(async move {
                if let Some(guard) = locks.try_acquire("shared").await.unwrap() {
                    winners.fetch_add(1, Ordering::SeqCst);
                    std::mem::forget(guard);
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_release_does_not_remove_new_owner() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store.clone(), fast_config(30));

        let stale = locks.try_acquire("job").await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let fresh = locks.try_acquire("job").await.unwrap().unwrap();
        assert_ne!(stale.owner_id(), fresh.owner_id());

        assert!(!stale.release().await.unwrap());
        let stored = store.read(ReadRequest::new("lock:job")).await.unwrap();
        assert_eq!(stored.value, fresh.owner_id());
    }

    #[tokio::test]
    async fn test_release_by_owner_id() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store, LockConfig::default());

        let guard = locks.try_acquire("job").await.unwrap().unwrap();
        assert!(!locks.release("job", "someone-else").await.unwrap());
        assert!(locks.release("job", guard.owner_id()).await.unwrap());
        assert!(!locks.release("job", guard.owner_id()).await.unwrap());
        std::mem::forget(guard);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_expiry() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store, fast_config(80));

        let _abandoned = locks.try_acquire("job").await.unwrap().unwrap();
        let start = Instant::now();
        let guard = locks.acquire("job", Some(Duration::from_secs(2))).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(guard.release().await.unwrap());
    }

    #[tokio::test]
    async fn test_acquire_times_out() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store, fast_config(10_000));

        let _held = locks.try_acquire("job").await.unwrap().unwrap();
        let result = locks.acquire("job", Some(Duration::from_millis(50))).await;
        assert!(matches!(result, Err(CoordinationError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_drop_releases_lock() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store, LockConfig::default());

        {
            let _guard = locks.try_acquire("job").await.unwrap().unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(locks.try_acquire("job").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_with_lock_releases_on_error() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store, fast_config(10_000));

        let out: Result<Result<(), &str>, _> = locks.with_lock("job", None, || async { Err("boom") }).await;
        assert_eq!(out.unwrap(), Err("boom"));
        assert!(locks.try_acquire("job").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store, LockConfig::default());
        assert!(matches!(locks.try_acquire("").await, Err(CoordinationError::InvalidArgument { .. })));
        assert!(matches!(locks.acquire("", None).await, Err(CoordinationError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn test_zero_auto_expire_rejected() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(store.clone(), fast_config(0));

        assert!(matches!(locks.try_acquire("job").await, Err(CoordinationError::InvalidArgument { .. })));
        assert!(matches!(
            locks.acquire("job", Some(Duration::from_millis(50))).await,
            Err(CoordinationError::InvalidArgument { .. })
        ));
        assert_eq!(store.key_count().await, 0);
    }

    #[tokio::test]
    async fn test_poll_wait_never_exceeds_interval() {
        let store = DeterministicKeyValueStore::new();
        let locks = LockManager::new(
            store,
            LockConfig {
                auto_expire_ms: 10_000,
                poll_interval_ms: 400,
                ..Default::default()
            },
        );

        let held = locks.try_acquire("job").await.unwrap().unwrap();
        let start = Instant::now();
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire("job", Some(Duration::from_secs(5))).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(held.release().await.unwrap());

        let guard = waiter.await.unwrap().unwrap();
        // One interval plus scheduling slack.
        assert!(start.elapsed() < Duration::from_millis(470), "waited {:?}", start.elapsed());
        assert!(guard.release().await.unwrap());
    }

    #[test]
    fn test_config_defaults_from_partial_toml_like_json() {
        let config: LockConfig = serde_json::from_str(r#"{"auto_expire_ms": 200}"#).unwrap();
        assert_eq!(config.key_prefix, "lock:");
        assert_eq!(config.auto_expire_ms, 200);
        assert_eq!(config.poll_interval_ms, DEFAULT_LOCK_POLL_INTERVAL_MS);
    }
}
