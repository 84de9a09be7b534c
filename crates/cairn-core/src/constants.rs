//! Fixed resource bounds and defaults shared by every cairn crate.
//!
//! Each bound caps an otherwise unbounded allocation (key sizes, scan pages,
//! range batches). Defaults for the coordination primitives live here so the
//! config layer and the primitives agree on them.

/// Maximum key size in bytes.
pub const MAX_KEY_SIZE: u32 = 1024;

/// Maximum value size in bytes (1 MiB).
pub const MAX_VALUE_SIZE: u32 = 1024 * 1024;

/// Maximum number of keys in a single multi-key command.
pub const MAX_BATCH_KEYS: u32 = 1000;

/// Default number of entries returned by a scan when no limit is given.
pub const DEFAULT_SCAN_LIMIT: u32 = 1000;

/// Upper bound on entries returned by a single scan page.
pub const MAX_SCAN_RESULTS: u32 = 10_000;

/// Upper bound on members returned by one scored-range call.
pub const MAX_RANGE_BATCH: u32 = 1000;

/// Writes between full expiry sweeps of the in-memory store.
pub const EXPIRY_SWEEP_INTERVAL: u32 = 256;

/// Keys removed per round trip when deleting by prefix.
pub const DELETE_PREFIX_BATCH: u32 = 500;

/// Default lock auto-expiry (5 minutes).
pub const DEFAULT_LOCK_AUTO_EXPIRE_MS: u64 = 300_000;

/// Default interval between blocking lock acquisition attempts.
pub const DEFAULT_LOCK_POLL_INTERVAL_MS: u64 = 100;

/// Default retention for a completed but uncollected future result (10 minutes).
pub const DEFAULT_FUTURE_RESULT_TTL_MS: u64 = 600_000;

/// Default interval between future completion polls.
pub const DEFAULT_FUTURE_POLL_INTERVAL_MS: u64 = 100;

/// Default time a created future waits for completion.
pub const DEFAULT_FUTURE_TIMEOUT_MS: u64 = 30_000;

/// Default capacity of a tiered cache's local layer.
pub const DEFAULT_LOCAL_CACHE_ENTRIES: u64 = 10_000;

/// Default connect timeout for networked stores.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_intervals_are_below_their_timeouts() {
        assert!(DEFAULT_LOCK_POLL_INTERVAL_MS < DEFAULT_LOCK_AUTO_EXPIRE_MS);
        assert!(DEFAULT_FUTURE_POLL_INTERVAL_MS < DEFAULT_FUTURE_TIMEOUT_MS);
    }

    #[test]
    fn batch_bounds_fit_scan_bounds() {
        assert!(DEFAULT_SCAN_LIMIT <= MAX_SCAN_RESULTS);
        assert!(DELETE_PREFIX_BATCH <= MAX_SCAN_RESULTS);
        assert!(MAX_RANGE_BATCH <= MAX_SCAN_RESULTS);
    }
}
