//! Scored sets consumed exactly once.
//!
//! Members carry a score (usually a Unix ms timestamp). Reading a range with
//! `remove` set fetches and deletes the matching members in one store-side
//! step, so concurrent consumers never receive the same member twice.

use std::sync::Arc;

use cairn_core::KeyValueStore;
use cairn_core::ScoredMember;
use cairn_core::WriteRequest;
use cairn_core::constants::MAX_RANGE_BATCH;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::error::CoordinationError;
use crate::error::InvalidArgumentSnafu;
use crate::error::ensure_non_empty;
use crate::types::now_unix_ms;

/// Configuration for range stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeConfig {
    #[serde(default = "default_range_prefix")]
    pub key_prefix: String,
    /// Upper bound on members returned by one call.
    #[serde(default = "default_max_batch")]
    pub max_batch: u32,
}

fn default_range_prefix() -> String {
    "range:".to_string()
}

fn default_max_batch() -> u32 {
    MAX_RANGE_BATCH
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_range_prefix(),
            max_batch: MAX_RANGE_BATCH,
        }
    }
}

/// One named scored set.
pub struct RangeStore<S: KeyValueStore + ?Sized = dyn KeyValueStore> {
    store: Arc<S>,
    key: String,
    max_batch: u32,
}

impl<S: KeyValueStore + ?Sized> RangeStore<S> {
    pub fn new(store: Arc<S>, name: &str, config: RangeConfig) -> Result<Self, CoordinationError> {
        ensure_non_empty("range name", name)?;
        Ok(Self {
            store,
            key: format!("{}{}", config.key_prefix, name),
            max_batch: config.max_batch.clamp(1, MAX_RANGE_BATCH),
        })
    }

    /// Insert `member`, or move it to `score` if already present.
    ///
    /// Returns `true` when the member was new.
    pub async fn add(&self, member: &str, score: f64) -> Result<bool, CoordinationError> {
        ensure_non_empty("range member", member)?;
        if score.is_nan() {
            return InvalidArgumentSnafu {
                reason: "score must not be NaN",
            }
            .fail();
        }
        let result = self.store.write(WriteRequest::scored_add(&self.key, member, score)).await?;
        Ok(result.applied.unwrap_or(false))
    }

    /// Returns `true` when the member was present.
    pub async fn remove(&self, member: &str) -> Result<bool, CoordinationError> {
        ensure_non_empty("range member", member)?;
        let result = self.store.write(WriteRequest::scored_remove(&self.key, member)).await?;
        Ok(result.applied.unwrap_or(false))
    }

    /// Up to `count` members with `min <= score <= max`, lowest score first.
    ///
    /// With `remove` set, the returned members are deleted in the same
    /// atomic step. `count` is capped at the configured batch size.
    pub async fn get_range(
        &self,
        min: f64,
        max: f64,
        count: u32,
        remove: bool,
    ) -> Result<Vec<ScoredMember>, CoordinationError> {
        if min.is_nan() || max.is_nan() {
            return InvalidArgumentSnafu {
                reason: "range bounds must not be NaN",
            }
            .fail();
        }
        if count == 0 || min > max {
            return Ok(Vec::new());
        }

        let limit = count.min(self.max_batch);
        let result = self.store.write(WriteRequest::scored_range(&self.key, min, max, limit, remove)).await?;
        let members = result.members.unwrap_or_default();
        if remove && !members.is_empty() {
            debug!(key = %self.key, taken = members.len(), "consumed range members");
        }
        Ok(members)
    }

    /// Remove and return up to `count` members scored at or before now.
    pub async fn take_due(&self, count: u32) -> Result<Vec<ScoredMember>, CoordinationError> {
        self.get_range(f64::NEG_INFINITY, now_unix_ms() as f64, count, true).await
    }
}
