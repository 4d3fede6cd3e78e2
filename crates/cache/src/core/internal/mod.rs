//! Internal counters shared by the request path and the IO lane

use std::sync::atomic::{AtomicU64, Ordering};
use urlcache_core::Timestamp;

/// Internal cache statistics with atomic counters
pub struct CacheStats {
    pub memory_hits: AtomicU64,
    pub disk_hits: AtomicU64,
    pub misses: AtomicU64,
    pub memory_stores: AtomicU64,
    pub disk_stores: AtomicU64,
    pub rejections: AtomicU64,
    pub invalidations: AtomicU64,
    pub blob_failures: AtomicU64,
    pub expired_removals: AtomicU64,
    pub evictions: AtomicU64,
    pub maintenance_runs: AtomicU64,
    pub stats_since: Timestamp,
}

impl CacheStats {
    pub fn new(stats_since: Timestamp) -> Self {
        Self {
            memory_hits: AtomicU64::new(0),
            disk_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            memory_stores: AtomicU64::new(0),
            disk_stores: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
            blob_failures: AtomicU64::new(0),
            expired_removals: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            maintenance_runs: AtomicU64::new(0),
            stats_since,
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
