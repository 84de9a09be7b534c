//! Shared helpers for coordination primitives.

use std::time::Duration;

/// Current wall-clock time as Unix milliseconds.
#[inline]
pub fn now_unix_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Interprets an optional wait bound: `None` and zero both mean "no limit".
pub(crate) fn effective_timeout(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|t| !t.is_zero())
}
