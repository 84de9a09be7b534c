//! Prefix scan types.

use serde::Deserialize;
use serde::Serialize;

/// Request to list keys sharing a prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ScanRequest {
    pub prefix: String,
    /// Page size; defaults to `DEFAULT_SCAN_LIMIT`, capped at `MAX_SCAN_RESULTS`.
    pub limit: Option<u32>,
    /// Opaque token returned by the previous page.
    pub continuation_token: Option<String>,
}

impl ScanRequest {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A key and its value as returned by a scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValueEntry {
    pub key: String,
    pub value: String,
}

/// One page of scan results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ScanResult {
    pub entries: Vec<KeyValueEntry>,
    pub count: u32,
    pub is_truncated: bool,
    pub continuation_token: Option<String>,
}
