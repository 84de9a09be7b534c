//! Error types for key-value store operations.

use thiserror::Error;

/// Errors returned by a [`KeyValueStore`](crate::KeyValueStore) backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyValueStoreError {
    #[error("key '{key}' not found")]
    NotFound { key: String },
    #[error("operation failed: {reason}")]
    Failed { reason: String },
    #[error("store unreachable: {reason}")]
    Connection { reason: String },
    #[error("operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
    #[error("key must not be empty")]
    EmptyKey,
    #[error("key size {size} exceeds maximum of {max} bytes")]
    KeyTooLarge { size: u32, max: u32 },
    #[error("value size {size} exceeds maximum of {max} bytes")]
    ValueTooLarge { size: u32, max: u32 },
    #[error("batch size {size} exceeds maximum of {max} keys")]
    BatchTooLarge { size: u32, max: u32 },
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },
    #[error("compare-and-swap failed for key '{key}': expected {expected:?}, found {actual:?}")]
    CompareAndSwapFailed {
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },
    #[error("value at key '{key}' is not an integer")]
    NotAnInteger { key: String },
}

impl KeyValueStoreError {
    /// Returns true for infrastructure failures that may succeed on retry.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, KeyValueStoreError::Connection { .. } | KeyValueStoreError::Timeout { .. })
    }
}

/// Errors produced while encoding or decoding stored payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode value: {reason}")]
    Encode { reason: String },
    #[error("failed to decode value: {reason}")]
    Decode { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_error_not_found_display() {
        let err = KeyValueStoreError::NotFound {
            key: "my-key".to_string(),
        };
        assert_eq!(err.to_string(), "key 'my-key' not found");
    }

    #[test]
    fn kv_error_cas_display_includes_both_sides() {
        let err = KeyValueStoreError::CompareAndSwapFailed {
            key: "k".to_string(),
            expected: Some("a".to_string()),
            actual: None,
        };
        let msg = err.to_string();
        assert!(msg.contains("\"a\""));
        assert!(msg.contains("None"));
    }

    #[test]
    fn connectivity_classification() {
        assert!(KeyValueStoreError::Connection { reason: "refused".into() }.is_connectivity());
        assert!(KeyValueStoreError::Timeout { duration_ms: 10 }.is_connectivity());
        assert!(!KeyValueStoreError::EmptyKey.is_connectivity());
        assert!(!KeyValueStoreError::NotFound { key: "k".into() }.is_connectivity());
    }

    #[test]
    fn codec_error_display() {
        let err = CodecError::Decode {
            reason: "expected value at line 1".to_string(),
        };
        assert_eq!(err.to_string(), "failed to decode value: expected value at line 1");
    }
}
