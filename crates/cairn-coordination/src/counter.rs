//! Atomic signed counters.
//!
//! Every mutation is a single store-side `Increment`, so concurrent callers
//! in any number of processes never lose updates.

use std::sync::Arc;

use cairn_core::KeyValueStore;
use cairn_core::KeyValueStoreError;
use cairn_core::ReadRequest;
use cairn_core::WriteRequest;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::error::CoordinationError;
use crate::error::InvalidArgumentSnafu;
use crate::error::ensure_non_empty;

/// Configuration for a counter store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterConfig {
    #[serde(default = "default_counter_prefix")]
    pub key_prefix: String,
}

fn default_counter_prefix() -> String {
    "counter:".to_string()
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_counter_prefix(),
        }
    }
}

/// A family of named counters sharing one key prefix.
pub struct CounterStore<S: KeyValueStore + ?Sized = dyn KeyValueStore> {
    store: Arc<S>,
    config: CounterConfig,
}

impl<S: KeyValueStore + ?Sized> Clone for CounterStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: KeyValueStore + ?Sized> CounterStore<S> {
    pub fn new(store: Arc<S>, config: CounterConfig) -> Self {
        Self { store, config }
    }

    fn counter_key(&self, key: &str) -> Result<String, CoordinationError> {
        ensure_non_empty("counter key", key)?;
        Ok(format!("{}{}", self.config.key_prefix, key))
    }

    /// Add `delta` and return the new value. Absent counters start at zero.
    pub async fn increment(&self, key: &str, delta: i64) -> Result<i64, CoordinationError> {
        let store_key = self.counter_key(key)?;
        let result = self.store.write(WriteRequest::increment(&store_key, delta)).await.map_err(|e| match e {
            KeyValueStoreError::NotAnInteger { key } => CoordinationError::CorruptedData {
                key,
                reason: "not a valid i64".to_string(),
            },
            other => CoordinationError::Storage { source: other },
        })?;

        let value = result.counter.ok_or_else(|| CoordinationError::CorruptedData {
            key: store_key.clone(),
            reason: "store did not report the new counter value".to_string(),
        })?;
        debug!(key = %store_key, delta, value, "counter updated");
        Ok(value)
    }

    /// Subtract `delta` and return the new value.
    pub async fn decrement(&self, key: &str, delta: i64) -> Result<i64, CoordinationError> {
        let Some(negated) = delta.checked_neg() else {
            return InvalidArgumentSnafu {
                reason: format!("decrement delta {delta} cannot be negated"),
            }
            .fail();
        };
        self.increment(key, negated).await
    }

    /// Current value, or zero when the counter does not exist.
    pub async fn get(&self, key: &str) -> Result<i64, CoordinationError> {
        let store_key = self.counter_key(key)?;
        Ok(self.read_raw(&store_key).await?.map(|(value, _)| value).unwrap_or(0))
    }

    /// Remove the counter; the next read sees zero.
    pub async fn clear(&self, key: &str) -> Result<(), CoordinationError> {
        let store_key = self.counter_key(key)?;
        self.store.write(WriteRequest::delete(&store_key)).await?;
        Ok(())
    }

    /// Set the counter to `new_value` only if it currently equals `expected`.
    ///
    /// An absent counter counts as zero. Returns `false` when the value
    /// differs or changes concurrently.
    pub async fn compare_and_set(&self, key: &str, expected: i64, new_value: i64) -> Result<bool, CoordinationError> {
        let store_key = self.counter_key(key)?;
        let raw_expected = match self.read_raw(&store_key).await? {
            Some((current, raw)) if current == expected => Some(raw),
            None if expected == 0 => None,
            _ => return Ok(false),
        };

        match self
            .store
            .write(WriteRequest::compare_and_swap(&store_key, raw_expected, new_value.to_string()))
            .await
        {
            Ok(_) => Ok(true),
            Err(KeyValueStoreError::CompareAndSwapFailed { .. }) => Ok(false),
            Err(e) => Err(CoordinationError::Storage { source: e }),
        }
    }

    async fn read_raw(&self, store_key: &str) -> Result<Option<(i64, String)>, CoordinationError> {
        match self.store.read(ReadRequest::new(store_key)).await {
            Ok(result) => {
                let value = result.value.parse::<i64>().map_err(|_| CoordinationError::CorruptedData {
                    key: store_key.to_string(),
                    reason: "not a valid i64".to_string(),
                })?;
                Ok(Some((value, result.value)))
            }
            Err(KeyValueStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(CoordinationError::Storage { source: e }),
        }
    }
}
