use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters, one set per cache instance
#[derive(Debug, Default)]
pub(crate) struct CacheStats {
    pub hot_hits: AtomicU64,
    pub warm_hits: AtomicU64,
    pub disk_hits: AtomicU64,
    pub misses: AtomicU64,
    pub puts: AtomicU64,
    pub invalidations: AtomicU64,
}

/// Serializable snapshot of cache counters
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsSnapshot {
    pub hot_hits: u64,
    pub warm_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub invalidations: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    pub(crate) fn record_hot_hit(&self) {
        self.hot_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_warm_hit(&self) {
        self.warm_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStatsSnapshot {
        let hot = self.hot_hits.load(Ordering::Relaxed);
        let warm = self.warm_hits.load(Ordering::Relaxed);
        let disk = self.disk_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let hits = hot + warm + disk;
        let total = hits + misses;

        CacheStatsSnapshot {
            hot_hits: hot,
            warm_hits: warm,
            disk_hits: disk,
            misses,
            puts: self.puts.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}
