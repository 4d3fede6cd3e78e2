//! Cache construction and startup reconciliation

use crate::config::{CacheConfig, BLOB_DIR_NAME, INDEX_FILE_NAME};
use crate::errors::{CacheError, Result};
use crate::executor;
use crate::index::DiskIndex;
use crate::keys::CacheKey;
use crate::maintenance::MaintenanceScheduler;
use crate::memory::MemoryTier;
use crate::policy::PolicyEngine;
use crate::storage::BlobStore;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::fs;
use urlcache_core::{Clock, SystemClock};

use super::types::{CacheInner, Shared, UrlCache};

impl UrlCache {
    /// Open the cache described by `config` using the system clock
    pub async fn open(config: CacheConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Open the cache with an injected clock
    ///
    /// Must be called inside a tokio runtime: it spawns the IO lane and the
    /// maintenance timer. Only configuration problems fail; a missing or
    /// corrupt index starts empty.
    pub async fn open_with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        if !config.enabled {
            tracing::info!("cache disabled, all lookups will miss");
            return Ok(Self {
                config: Arc::new(config),
                inner: None,
            });
        }

        let root = config.root_dir()?.to_path_buf();
        let blob_dir = root.join(BLOB_DIR_NAME);
        match fs::create_dir_all(&blob_dir).await {
            Ok(()) => {}
            Err(e) => {
                return Err(CacheError::configuration(format!(
                    "cannot create cache root '{}': {e}",
                    root.display()
                )));
            }
        }

        let index = DiskIndex::load(root.join(INDEX_FILE_NAME)).await;
        let blobs = BlobStore::new(blob_dir);
        reconcile(&index, &blobs).await;

        let shared = Arc::new(Shared::new(
            index,
            blobs,
            clock,
            config.disk_capacity_bytes,
            config.target_fill_factor,
        ));
        let io = executor::spawn(Arc::clone(&shared));
        let scheduler = MaintenanceScheduler::new(Arc::clone(&shared), io.clone());
        scheduler.start(config.maintenance_interval);

        if shared.over_capacity() {
            scheduler.trigger();
        }

        tracing::info!(
            root = %root.display(),
            entries = shared.index.len(),
            disk_usage_bytes = shared.index.total_usage_bytes(),
            disk_capacity_bytes = config.disk_capacity_bytes,
            "opened cache"
        );

        let inner = Arc::new(CacheInner {
            root,
            policy: PolicyEngine::from_config(&config),
            memory: MemoryTier::new(config.memory_capacity_bytes, config.max_memory_cache_item_size),
            shared,
            io,
            scheduler,
        });

        Ok(Self {
            config: Arc::new(config),
            inner: Some(inner),
        })
    }
}

/// Bring the index and the blob directory back in line after a restart
///
/// Index entries without a blob are dropped; blobs and temp files without an
/// index entry are deleted. Runs before the IO lane starts, so nothing else
/// is touching either side.
async fn reconcile(index: &DiskIndex, blobs: &BlobStore) {
    match blobs.list_keys().await {
        Ok(keys) => {
            let present: HashSet<CacheKey> = keys.into_iter().collect();
            let dropped = index.remove_where(|meta| !present.contains(&meta.key));
            if !dropped.is_empty() {
                tracing::warn!(count = dropped.len(), "dropped index entries with missing blobs");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not list blobs, skipping reconciliation");
            return;
        }
    }

    match blobs.sweep(|key| index.contains_key(key)).await {
        Ok(report) if report.orphaned_blobs + report.temp_files > 0 => {
            tracing::info!(
                orphaned_blobs = report.orphaned_blobs,
                temp_files = report.temp_files,
                freed_bytes = report.freed_bytes,
                "swept orphaned blob files"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "orphan sweep failed"),
    }

    match index.persist().await {
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "failed to persist reconciled index"),
    }
}
