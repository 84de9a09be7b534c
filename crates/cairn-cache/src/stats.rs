use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Live counters for one cache instance.
#[derive(Debug, Default)]
pub struct CacheStats {
    local_hits: AtomicU64,
    shared_hits: AtomicU64,
    misses: AtomicU64,
    loader_calls: AtomicU64,
    shared_write_failures: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    pub local_hits: u64,
    pub shared_hits: u64,
    pub misses: u64,
    pub loader_calls: u64,
    pub shared_write_failures: u64,
}

impl CacheStatsSnapshot {
    /// Fraction of lookups served by either layer.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.local_hits + self.shared_hits;
        let total = hits + self.misses;
        if total == 0 { 0.0 } else { hits as f64 / total as f64 }
    }
}

impl CacheStats {
    pub(crate) fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_shared_hit(&self) {
        self.shared_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_loader_call(&self) {
        self.loader_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_shared_write_failure(&self) {
        self.shared_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            shared_hits: self.shared_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loader_calls: self.loader_calls.load(Ordering::Relaxed),
            shared_write_failures: self.shared_write_failures.load(Ordering::Relaxed),
        }
    }
}
