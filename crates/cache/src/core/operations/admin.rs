//! Accounting, statistics and administrative operations

use crate::config::CacheConfig;
use crate::core::internal::CacheStats;
use crate::core::types::UrlCache;
use crate::entry::CacheEntryMetadata;
use crate::errors::Result;
use crate::executor::IoOp;
use crate::keys::Fingerprint;
use crate::maintenance::{MaintenanceOutcome, MaintenanceReport};
use crate::storage::SweepReport;
use crate::traits::CacheStatistics;
use std::path::Path;
use urlcache_core::HttpRequest;

impl UrlCache {
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.inner.as_ref().map(|inner| inner.root.as_path())
    }

    /// Bytes recorded in the disk index
    ///
    /// Counts mutations the IO lane has applied; writes still queued are not
    /// included until they land.
    pub fn current_disk_usage_bytes(&self) -> u64 {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.shared.index.total_usage_bytes())
    }

    pub fn current_memory_usage_bytes(&self) -> u64 {
        self.inner
            .as_ref()
            .map_or(0, |inner| inner.memory.usage_bytes())
    }

    pub fn disk_capacity(&self) -> u64 {
        match &self.inner {
            Some(inner) => inner.shared.disk_capacity(),
            None => self.config.disk_capacity_bytes,
        }
    }

    /// Change the disk capacity; a pass is triggered if usage now exceeds it
    pub fn set_disk_capacity(&self, bytes: u64) {
        let Some(inner) = &self.inner else {
            return;
        };
        inner.shared.set_disk_capacity(bytes);
        tracing::info!(disk_capacity_bytes = bytes, "disk capacity changed");
        if inner.shared.over_capacity() {
            inner.scheduler.trigger();
        }
    }

    /// Disk index metadata for `request`, expired or not
    pub fn entry_metadata(&self, request: &HttpRequest) -> Option<CacheEntryMetadata> {
        let inner = self.inner.as_ref()?;
        inner.shared.index.get(&Fingerprint::compute_key(request))
    }

    pub fn stats(&self) -> CacheStatistics {
        let Some(inner) = &self.inner else {
            return CacheStatistics {
                disk_capacity_bytes: self.config.disk_capacity_bytes,
                memory_capacity_bytes: self.config.memory_capacity_bytes,
                ..CacheStatistics::default()
            };
        };

        let stats = &inner.shared.stats;
        CacheStatistics {
            memory_hits: CacheStats::get(&stats.memory_hits),
            disk_hits: CacheStats::get(&stats.disk_hits),
            misses: CacheStats::get(&stats.misses),
            memory_stores: CacheStats::get(&stats.memory_stores),
            disk_stores: CacheStats::get(&stats.disk_stores),
            rejections: CacheStats::get(&stats.rejections),
            invalidations: CacheStats::get(&stats.invalidations),
            blob_failures: CacheStats::get(&stats.blob_failures),
            expired_removals: CacheStats::get(&stats.expired_removals),
            evictions: CacheStats::get(&stats.evictions),
            maintenance_runs: CacheStats::get(&stats.maintenance_runs),
            memory_entries: inner.memory.len(),
            memory_usage_bytes: inner.memory.usage_bytes(),
            memory_capacity_bytes: inner.memory.capacity_bytes(),
            disk_entries: inner.shared.index.len(),
            disk_usage_bytes: inner.shared.index.total_usage_bytes(),
            disk_capacity_bytes: inner.shared.disk_capacity(),
            pending_disk_ops: inner.shared.pending.len(),
            stats_since: Some(stats.stats_since),
        }
    }

    /// Wait for every queued disk mutation, then persist the index if dirty
    ///
    /// Returns whether the index file was written.
    pub async fn flush(&self) -> Result<bool> {
        let Some(inner) = &self.inner else {
            return Ok(false);
        };
        inner
            .io
            .request("flush", |reply| IoOp::Flush { reply })
            .await?
    }

    /// Drop every cached response from both tiers and persist an empty index
    ///
    /// Returns the number of disk entries removed.
    pub async fn clear(&self) -> Result<usize> {
        let Some(inner) = &self.inner else {
            return Ok(0);
        };
        inner.memory.clear();
        let removed = inner
            .io
            .request("clear", |reply| IoOp::Clear { reply })
            .await??;
        // lookups racing the clear may have promoted disk entries
        inner.memory.clear();
        tracing::info!(removed, "cache cleared");
        Ok(removed)
    }

    /// Run a maintenance pass now, unless one is already queued or running
    pub async fn run_maintenance(&self) -> Result<MaintenanceOutcome> {
        match &self.inner {
            Some(inner) => inner.scheduler.run_now().await,
            None => Ok(MaintenanceOutcome::Completed(MaintenanceReport::default())),
        }
    }

    /// Delete blob and temp files the index does not know about
    pub async fn sweep_orphans(&self) -> Result<SweepReport> {
        let Some(inner) = &self.inner else {
            return Ok(SweepReport::default());
        };
        inner
            .io
            .request("sweep orphans", |reply| IoOp::Sweep { reply })
            .await?
    }
}
