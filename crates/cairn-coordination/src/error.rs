//! Error types for coordination primitives.

use cairn_core::CodecError;
use cairn_core::KeyValueStoreError;
use snafu::Snafu;

/// Errors from coordination primitives.
///
/// Losing a race for ownership (a lock held elsewhere, a release by a
/// non-owner) is reported through return values, never through this type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CoordinationError {
    /// Operation timed out.
    #[snafu(display("operation timed out: {operation}"))]
    Timeout {
        /// Description of the operation.
        operation: String,
    },

    /// A caller-supplied argument was rejected before touching the store.
    #[snafu(display("invalid argument: {reason}"))]
    InvalidArgument { reason: String },

    /// Maximum retries exceeded.
    #[snafu(display("max retries exceeded for {operation}: {attempts} attempts"))]
    MaxRetriesExceeded {
        /// Description of the operation.
        operation: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Data in storage is corrupted or unparseable.
    #[snafu(display("corrupted data in key '{key}': {reason}"))]
    CorruptedData {
        /// The key with corrupted data.
        key: String,
        /// Description of what went wrong.
        reason: String,
    },

    /// The waiting side went away before a result arrived.
    #[snafu(display("operation cancelled: {operation}"))]
    Cancelled { operation: String },

    /// Underlying storage error.
    #[snafu(display("storage error: {source}"))]
    Storage {
        /// The underlying error.
        source: KeyValueStoreError,
    },

    /// A stored payload could not be encoded or decoded.
    #[snafu(display("codec error for key '{key}': {source}"))]
    Codec { key: String, source: CodecError },
}

impl CoordinationError {
    /// True when the failure came from the store being unreachable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, CoordinationError::Storage { source } if source.is_connectivity())
    }
}

impl From<KeyValueStoreError> for CoordinationError {
    fn from(source: KeyValueStoreError) -> Self {
        CoordinationError::Storage { source }
    }
}

/// Reject empty names and keys up front.
pub(crate) fn ensure_non_empty(what: &str, value: &str) -> Result<(), CoordinationError> {
    if value.is_empty() {
        return InvalidArgumentSnafu {
            reason: format!("{what} must not be empty"),
        }
        .fail();
    }
    Ok(())
}
