//! In-memory implementation of [`KeyValueStore`].
//!
//! Provides a deterministic, non-persistent store for unit tests and
//! single-process deployments. Every command runs under one mutex, so each
//! command is atomic with respect to every other command, which is the same
//! guarantee the networked backend gets from server-side execution.
//!
//! Unlike a plain map, this store honours per-key expiry: expired entries are
//! treated as absent and dropped on the next access to that key, and every
//! [`EXPIRY_SWEEP_INTERVAL`] writes a full sweep drops the ones nobody touches.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tokio::time::Instant;

use crate::constants::DEFAULT_SCAN_LIMIT;
use crate::constants::EXPIRY_SWEEP_INTERVAL;
use crate::constants::MAX_SCAN_RESULTS;
use crate::error::KeyValueStoreError;
use crate::kv::DeleteRequest;
use crate::kv::DeleteResult;
use crate::kv::KeyValueEntry;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::ScanRequest;
use crate::kv::ScanResult;
use crate::kv::ScoredMember;
use crate::kv::WriteCommand;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;
use crate::kv::validate_write_command;
use crate::traits::KeyValueStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String, ttl_ms: Option<u64>) -> Self {
        let expires_at = ttl_ms.filter(|ms| *ms > 0).map(|ms| Instant::now() + Duration::from_millis(ms));
        Self { value, expires_at }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Inner {
    strings: HashMap<String, Entry>,
    sorted: HashMap<String, HashMap<String, f64>>,
    writes_since_sweep: u32,
}

impl Inner {
    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&Entry> {
        let now = Instant::now();
        if self.strings.get(key).is_some_and(|e| e.is_expired(now)) {
            self.strings.remove(key);
        }
        self.strings.get(key)
    }

    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.strings.retain(|_, e| !e.is_expired(now));
        self.writes_since_sweep = 0;
    }

    fn count_write(&mut self) {
        self.writes_since_sweep += 1;
        if self.writes_since_sweep >= EXPIRY_SWEEP_INTERVAL {
            self.purge_expired();
        }
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let live = self.live(key).is_some();
        let removed_string = live && self.strings.remove(key).is_some();
        let removed_sorted = self.sorted.remove(key).is_some();
        removed_string || removed_sorted
    }
}

/// In-memory deterministic implementation of [`KeyValueStore`].
///
/// # Example
///
/// ```ignore
/// use cairn_core::{DeterministicKeyValueStore, KeyValueStore, WriteRequest};
///
/// let store = DeterministicKeyValueStore::new();
/// store.write(WriteRequest::set_with_ttl("greeting", "hello", 1_000)).await?;
/// ```
#[derive(Clone, Default)]
pub struct DeterministicKeyValueStore {
    inner: Arc<Mutex<Inner>>,
}

impl DeterministicKeyValueStore {
    /// Create a new in-memory key-value store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of live string keys (sorted sets excluded).
    pub async fn key_count(&self) -> usize {
        let mut inner = self.inner.lock().await;
        inner.purge_expired();
        inner.strings.len()
    }
}

#[async_trait]
impl KeyValueStore for DeterministicKeyValueStore {
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        validate_write_command(&request.command)?;

        let mut inner = self.inner.lock().await;
        inner.count_write();
        match request.command.clone() {
            WriteCommand::Set { key, value } => {
                inner.strings.insert(key, Entry::new(value, None));
                Ok(WriteResult {
                    command: Some(request.command),
                    ..Default::default()
                })
            }
            WriteCommand::SetWithTTL { key, value, ttl_ms } => {
                inner.strings.insert(key, Entry::new(value, Some(ttl_ms)));
                Ok(WriteResult {
                    command: Some(request.command),
                    ..Default::default()
                })
            }
            WriteCommand::SetIfAbsent { key, value, ttl_ms } => {
                let applied = inner.live(&key).is_none();
                if applied {
                    inner.strings.insert(key, Entry::new(value, ttl_ms));
                }
                Ok(WriteResult {
                    command: Some(request.command),
                    applied: Some(applied),
                    ..Default::default()
                })
            }
            WriteCommand::Delete { ref key } => {
                let deleted = inner.remove_key(key);
                Ok(WriteResult {
                    command: Some(request.command.clone()),
                    keys_deleted: Some(u32::from(deleted)),
                    ..Default::default()
                })
            }
            WriteCommand::DeleteMulti { ref keys } => {
                let mut deleted = 0u32;
                for key in keys {
                    if inner.remove_key(key) {
                        deleted += 1;
                    }
                }
                Ok(WriteResult {
                    command: Some(request.command.clone()),
                    keys_deleted: Some(deleted),
                    ..Default::default()
                })
            }
            WriteCommand::DeletePrefix { ref prefix } => {
                inner.purge_expired();
                let before = inner.strings.len() + inner.sorted.len();
                inner.strings.retain(|k, _| !k.starts_with(prefix.as_str()));
                inner.sorted.retain(|k, _| !k.starts_with(prefix.as_str()));
                let deleted = before - (inner.strings.len() + inner.sorted.len());
                Ok(WriteResult {
                    command: Some(request.command.clone()),
                    keys_deleted: Some(deleted as u32),
                    ..Default::default()
                })
            }
            WriteCommand::CompareAndSwap {
                key,
                expected,
                new_value,
            } => {
                let current = inner.live(&key).cloned();
                let condition_matches = match (&expected, &current) {
                    (None, None) => true,
                    (Some(exp), Some(cur)) => exp == &cur.value,
                    _ => false,
                };
                if condition_matches {
                    let expires_at = current.and_then(|c| c.expires_at);
                    inner.strings.insert(key.clone(), Entry {
                        value: new_value.clone(),
                        expires_at,
                    });
                    Ok(WriteResult {
                        command: Some(WriteCommand::CompareAndSwap {
                            key,
                            expected,
                            new_value,
                        }),
                        applied: Some(true),
                        ..Default::default()
                    })
                } else {
                    Err(KeyValueStoreError::CompareAndSwapFailed {
                        key,
                        expected,
                        actual: current.map(|c| c.value),
                    })
                }
            }
            WriteCommand::CompareAndDelete { key, expected } => {
                let current = inner.live(&key).map(|e| e.value.clone());
                if current.as_deref() == Some(expected.as_str()) {
                    inner.strings.remove(&key);
                    Ok(WriteResult {
                        command: Some(WriteCommand::CompareAndDelete { key, expected }),
                        applied: Some(true),
                        keys_deleted: Some(1),
                        ..Default::default()
                    })
                } else {
                    Err(KeyValueStoreError::CompareAndSwapFailed {
                        key,
                        expected: Some(expected),
                        actual: current,
                    })
                }
            }
            WriteCommand::Increment { key, delta } => {
                let (current, expires_at) = match inner.live(&key) {
                    Some(entry) => {
                        let parsed = entry
                            .value
                            .parse::<i64>()
                            .map_err(|_| KeyValueStoreError::NotAnInteger { key: key.clone() })?;
                        (parsed, entry.expires_at)
                    }
                    None => (0, None),
                };
                let updated = current.checked_add(delta).ok_or_else(|| KeyValueStoreError::Failed {
                    reason: format!("increment of '{key}' by {delta} would overflow"),
                })?;
                inner.strings.insert(key, Entry {
                    value: updated.to_string(),
                    expires_at,
                });
                Ok(WriteResult {
                    command: Some(request.command),
                    counter: Some(updated),
                    ..Default::default()
                })
            }
            WriteCommand::Take { ref key } => {
                let value = if inner.live(key).is_some() {
                    inner.strings.remove(key).map(|e| e.value)
                } else {
                    None
                };
                Ok(WriteResult {
                    command: Some(request.command.clone()),
                    keys_deleted: Some(u32::from(value.is_some())),
                    value,
                    ..Default::default()
                })
            }
            WriteCommand::ScoredAdd { key, member, score } => {
                let applied = inner.sorted.entry(key).or_default().insert(member, score).is_none();
                Ok(WriteResult {
                    command: Some(request.command),
                    applied: Some(applied),
                    ..Default::default()
                })
            }
            WriteCommand::ScoredRemove { ref key, ref member } => {
                let removed = match inner.sorted.get_mut(key) {
                    Some(set) => {
                        let removed = set.remove(member).is_some();
                        if set.is_empty() {
                            inner.sorted.remove(key);
                        }
                        removed
                    }
                    None => false,
                };
                Ok(WriteResult {
                    command: Some(request.command.clone()),
                    applied: Some(removed),
                    ..Default::default()
                })
            }
            WriteCommand::ScoredRange {
                ref key,
                min,
                max,
                limit,
                remove,
            } => {
                let members = match inner.sorted.get_mut(key) {
                    Some(set) => {
                        let mut matching: Vec<ScoredMember> = set
                            .iter()
                            .filter(|(_, score)| **score >= min && **score <= max)
                            .map(|(member, score)| ScoredMember::new(member.clone(), *score))
                            .collect();
                        matching.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.member.cmp(&b.member)));
                        matching.truncate(limit as usize);
                        if remove {
                            for m in &matching {
                                set.remove(&m.member);
                            }
                            if set.is_empty() {
                                inner.sorted.remove(key);
                            }
                        }
                        matching
                    }
                    None => Vec::new(),
                };
                Ok(WriteResult {
                    command: Some(request.command.clone()),
                    members: Some(members),
                    ..Default::default()
                })
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        let mut inner = self.inner.lock().await;
        match inner.live(&request.key) {
            Some(entry) => {
                let ttl_remaining_ms = entry
                    .expires_at
                    .map(|at| at.saturating_duration_since(Instant::now()).as_millis() as u64);
                Ok(ReadResult {
                    value: entry.value.clone(),
                    key: request.key,
                    ttl_remaining_ms,
                })
            }
            None => Err(KeyValueStoreError::NotFound { key: request.key }),
        }
    }

    async fn delete(&self, request: DeleteRequest) -> Result<DeleteResult, KeyValueStoreError> {
        if request.key.is_empty() {
            return Err(KeyValueStoreError::EmptyKey);
        }
        let mut inner = self.inner.lock().await;
        let is_deleted = inner.remove_key(&request.key);
        Ok(DeleteResult {
            key: request.key,
            is_deleted,
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        let mut inner = self.inner.lock().await;
        inner.purge_expired();

        let limit = request.limit.unwrap_or(DEFAULT_SCAN_LIMIT).min(MAX_SCAN_RESULTS) as usize;

        // Continuation token format: base64(last_key)
        let start_after = request.continuation_token.as_ref().and_then(|token| {
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, token)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        });

        let mut matching: Vec<_> = inner
            .strings
            .iter()
            .filter(|(k, _)| k.starts_with(&request.prefix))
            .filter(|(k, _)| match &start_after {
                Some(after) => k.as_str() > after.as_str(),
                None => true,
            })
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect();

        matching.sort_by(|a, b| a.0.cmp(&b.0));

        let is_truncated = matching.len() > limit;
        let entries: Vec<KeyValueEntry> = matching
            .into_iter()
            .take(limit)
            .map(|(key, value)| KeyValueEntry { key, value })
            .collect();

        let continuation_token = if is_truncated {
            entries
                .last()
                .map(|e| base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &e.key))
        } else {
            None
        };

        let count = entries.len() as u32;

        Ok(ScanResult {
            entries,
            count,
            is_truncated,
            continuation_token,
        })
    }
}
