//! Core cache types and structures

use crate::config::{self, CacheConfig};
use crate::executor::{IoHandle, PendingWrites};
use crate::index::DiskIndex;
use crate::maintenance::MaintenanceScheduler;
use crate::memory::MemoryTier;
use crate::policy::PolicyEngine;
use crate::storage::BlobStore;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use urlcache_core::{Clock, Timestamp};

use super::internal::CacheStats;

/// Two-tier HTTP response cache
///
/// Cloning is cheap; clones share the same tiers and IO lane. Dropping the
/// last clone stops the maintenance timer and lets the IO lane drain its
/// queue and persist the index before it exits.
#[derive(Clone)]
pub struct UrlCache {
    pub(super) config: Arc<CacheConfig>,
    /// `None` when the cache is disabled
    pub(super) inner: Option<Arc<CacheInner>>,
}

pub(super) struct CacheInner {
    pub root: PathBuf,
    pub policy: PolicyEngine,
    pub memory: MemoryTier,
    pub shared: Arc<Shared>,
    pub io: IoHandle,
    pub scheduler: MaintenanceScheduler,
}

/// State the request path shares with the IO lane and the scheduler
pub(crate) struct Shared {
    pub index: DiskIndex,
    pub blobs: BlobStore,
    pub pending: PendingWrites,
    pub stats: CacheStats,
    pub clock: Arc<dyn Clock>,
    disk_capacity: AtomicU64,
    fill_factor: f64,
    maintenance_busy: AtomicBool,
}

impl Shared {
    pub fn new(
        index: DiskIndex,
        blobs: BlobStore,
        clock: Arc<dyn Clock>,
        disk_capacity: u64,
        fill_factor: f64,
    ) -> Self {
        let stats = CacheStats::new(clock.now());
        Self {
            index,
            blobs,
            pending: PendingWrites::new(),
            stats,
            clock,
            disk_capacity: AtomicU64::new(disk_capacity),
            fill_factor,
            maintenance_busy: AtomicBool::new(false),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn disk_capacity(&self) -> u64 {
        self.disk_capacity.load(Ordering::Acquire)
    }

    pub fn set_disk_capacity(&self, bytes: u64) {
        self.disk_capacity.store(bytes, Ordering::Release);
    }

    pub fn eviction_target(&self) -> u64 {
        config::eviction_target(self.disk_capacity(), self.fill_factor)
    }

    pub fn over_capacity(&self) -> bool {
        self.index.total_usage_bytes() > self.disk_capacity()
    }

    /// Claim the single maintenance slot; false if a run is queued or running
    pub fn try_begin_maintenance(&self) -> bool {
        self.maintenance_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_maintenance(&self) {
        self.maintenance_busy.store(false, Ordering::Release);
    }

    pub fn maintenance_busy(&self) -> bool {
        self.maintenance_busy.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for UrlCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("UrlCache")
                .field("root", &inner.root)
                .field("disk_entries", &inner.shared.index.len())
                .field("disk_usage_bytes", &inner.shared.index.total_usage_bytes())
                .field("memory_entries", &inner.memory.len())
                .finish(),
            None => f.debug_struct("UrlCache").field("enabled", &false).finish(),
        }
    }
}
