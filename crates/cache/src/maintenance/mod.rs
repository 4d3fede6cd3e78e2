//! Disk maintenance: expiry, eviction and index persistence
//!
//! A pass runs on the IO lane and does, in order:
//!
//! 1. remove every expired entry and delete its blob
//! 2. if usage still exceeds capacity, evict oldest entries down to
//!    `capacity * target_fill_factor` and delete their blobs
//! 3. persist the index if dirty
//!
//! Expired entries always go before live ones are evicted.

mod background;

pub use background::MaintenanceScheduler;

use crate::core::internal::CacheStats;
use crate::core::types::Shared;
use crate::executor::delete_blob;

/// What a single maintenance pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub expired: usize,
    pub evicted: usize,
    pub freed_bytes: u64,
    /// Whether the index file was written
    pub persisted: bool,
    pub usage_after: u64,
}

/// Result of asking for an on-demand pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceOutcome {
    Completed(MaintenanceReport),
    /// Another pass was already queued or running
    Skipped,
}

pub(crate) async fn run_pass(shared: &Shared) -> MaintenanceReport {
    let usage_before = shared.index.total_usage_bytes();

    let expired = shared.index.remove_expired(shared.now());
    for key in &expired {
        delete_blob(shared, key).await;
    }

    let evicted = if shared.over_capacity() {
        shared.index.evict_until(shared.eviction_target())
    } else {
        Vec::new()
    };
    for key in &evicted {
        delete_blob(shared, key).await;
    }

    let persisted = match shared.index.persist().await {
        Ok(written) => written,
        Err(e) => {
            tracing::warn!(error = %e, "failed to persist index during maintenance");
            false
        }
    };

    let usage_after = shared.index.total_usage_bytes();
    let report = MaintenanceReport {
        expired: expired.len(),
        evicted: evicted.len(),
        freed_bytes: usage_before.saturating_sub(usage_after),
        persisted,
        usage_after,
    };

    CacheStats::bump(&shared.stats.maintenance_runs);
    CacheStats::add(&shared.stats.expired_removals, report.expired as u64);
    CacheStats::add(&shared.stats.evictions, report.evicted as u64);

    if report.expired + report.evicted > 0 {
        tracing::info!(
            expired = report.expired,
            evicted = report.evicted,
            freed_bytes = report.freed_bytes,
            usage_bytes = usage_after,
            "disk maintenance freed space"
        );
    } else {
        tracing::debug!(usage_bytes = usage_after, persisted, "disk maintenance found nothing to do");
    }

    report
}
