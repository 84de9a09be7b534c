//! Write operation types for modifying key-value state.
//!
//! Every command is applied atomically by the backend. Commands that other
//! stores would express as server-side scripts (compare-and-delete, take,
//! range-and-remove) are first-class variants here so that callers never
//! compose them from separate reads and writes.

use serde::Deserialize;
use serde::Serialize;

use super::ScoredMember;

/// Commands for modifying key-value state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum WriteCommand {
    /// Set a single key-value pair, clearing any expiry.
    Set { key: String, value: String },
    /// Set a key-value pair with a time-to-live. `ttl_ms == 0` means no expiry.
    SetWithTTL { key: String, value: String, ttl_ms: u64 },
    /// Set only if the key is absent; value and TTL are written together.
    SetIfAbsent {
        key: String,
        value: String,
        ttl_ms: Option<u64>,
    },
    /// Delete a single key.
    Delete { key: String },
    /// Delete multiple keys.
    DeleteMulti { keys: Vec<String> },
    /// Delete every key starting with `prefix`.
    DeletePrefix { prefix: String },
    /// Compare-and-swap: update if the current value matches `expected`
    /// (`None` means the key must be absent). Existing expiry is kept.
    CompareAndSwap {
        key: String,
        expected: Option<String>,
        new_value: String,
    },
    /// Compare-and-delete: delete if the current value matches `expected`.
    CompareAndDelete { key: String, expected: String },
    /// Add `delta` to an integer value, creating it at zero when absent.
    Increment { key: String, delta: i64 },
    /// Fetch and remove a value in one step.
    Take { key: String },
    /// Insert or update a scored member of a sorted set.
    ScoredAdd { key: String, member: String, score: f64 },
    /// Remove a member from a sorted set.
    ScoredRemove { key: String, member: String },
    /// Return up to `limit` members with `min <= score <= max` in ascending
    /// score order, removing them in the same step when `remove` is set.
    ScoredRange {
        key: String,
        min: f64,
        max: f64,
        limit: u32,
        remove: bool,
    },
}

impl WriteCommand {
    /// Short command name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            WriteCommand::Set { .. } => "set",
            WriteCommand::SetWithTTL { .. } => "set_with_ttl",
            WriteCommand::SetIfAbsent { .. } => "set_if_absent",
            WriteCommand::Delete { .. } => "delete",
            WriteCommand::DeleteMulti { .. } => "delete_multi",
            WriteCommand::DeletePrefix { .. } => "delete_prefix",
            WriteCommand::CompareAndSwap { .. } => "compare_and_swap",
            WriteCommand::CompareAndDelete { .. } => "compare_and_delete",
            WriteCommand::Increment { .. } => "increment",
            WriteCommand::Take { .. } => "take",
            WriteCommand::ScoredAdd { .. } => "scored_add",
            WriteCommand::ScoredRemove { .. } => "scored_remove",
            WriteCommand::ScoredRange { .. } => "scored_range",
        }
    }
}

/// Request to perform a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WriteRequest {
    pub command: WriteCommand,
}

impl WriteRequest {
    /// Create a Set command to store a key-value pair.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Set {
                key: key.into(),
                value: value.into(),
            },
        }
    }

    /// Create a Set command with TTL.
    pub fn set_with_ttl(key: impl Into<String>, value: impl Into<String>, ttl_ms: u64) -> Self {
        Self {
            command: WriteCommand::SetWithTTL {
                key: key.into(),
                value: value.into(),
                ttl_ms,
            },
        }
    }

    /// Create a conditional set that only applies when the key is absent.
    pub fn set_if_absent(key: impl Into<String>, value: impl Into<String>, ttl_ms: Option<u64>) -> Self {
        Self {
            command: WriteCommand::SetIfAbsent {
                key: key.into(),
                value: value.into(),
                ttl_ms,
            },
        }
    }

    /// Create a Delete command.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Delete { key: key.into() },
        }
    }

    /// Create a DeletePrefix command.
    pub fn delete_prefix(prefix: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::DeletePrefix { prefix: prefix.into() },
        }
    }

    /// Create a CompareAndSwap command.
    pub fn compare_and_swap(key: impl Into<String>, expected: Option<String>, new_value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::CompareAndSwap {
                key: key.into(),
                expected,
                new_value: new_value.into(),
            },
        }
    }

    /// Create a CompareAndDelete command.
    pub fn compare_and_delete(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::CompareAndDelete {
                key: key.into(),
                expected: expected.into(),
            },
        }
    }

    /// Create an Increment command.
    pub fn increment(key: impl Into<String>, delta: i64) -> Self {
        Self {
            command: WriteCommand::Increment { key: key.into(), delta },
        }
    }

    /// Create a Take (get-and-delete) command.
    pub fn take(key: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Take { key: key.into() },
        }
    }

    /// Create a ScoredAdd command.
    pub fn scored_add(key: impl Into<String>, member: impl Into<String>, score: f64) -> Self {
        Self {
            command: WriteCommand::ScoredAdd {
                key: key.into(),
                member: member.into(),
                score,
            },
        }
    }

    /// Create a ScoredRemove command.
    pub fn scored_remove(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::ScoredRemove {
                key: key.into(),
                member: member.into(),
            },
        }
    }

    /// Create a ScoredRange command.
    pub fn scored_range(key: impl Into<String>, min: f64, max: f64, limit: u32, remove: bool) -> Self {
        Self {
            command: WriteCommand::ScoredRange {
                key: key.into(),
                min,
                max,
                limit,
                remove,
            },
        }
    }

    /// Create from a raw WriteCommand.
    pub fn from_command(command: WriteCommand) -> Self {
        Self { command }
    }
}

/// Result of a write operation.
///
/// Only the fields relevant to the executed command are populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WriteResult {
    pub command: Option<WriteCommand>,
    /// Whether a conditional write took effect.
    pub applied: Option<bool>,
    /// Value returned by `Take`.
    pub value: Option<String>,
    /// New value after `Increment`.
    pub counter: Option<i64>,
    pub keys_deleted: Option<u32>,
    /// Members returned by `ScoredRange`.
    pub members: Option<Vec<ScoredMember>>,
}
