//! The IO lane: one task that applies every disk mutation in order
//!
//! The request path never touches disk for writes. It records the mutation
//! in [`PendingWrites`] and queues an [`IoOp`]; the lane applies ops strictly
//! in arrival order, which gives per-key ordering for free. When every sender
//! is gone the lane persists a dirty index and exits.

mod pending;

pub use pending::{Pending, PendingWrites};

use crate::core::internal::CacheStats;
use crate::core::types::Shared;
use crate::entry::{CacheEntryMetadata, CachedResponse};
use crate::errors::{CacheError, Result};
use crate::keys::CacheKey;
use crate::maintenance::{self, MaintenanceReport};
use crate::storage::{format, SweepReport};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub(crate) enum IoOp {
    /// Write the blob, then publish the metadata
    Store {
        entry: Arc<CachedResponse>,
        meta: CacheEntryMetadata,
        seq: u64,
    },
    Remove {
        key: CacheKey,
        seq: u64,
    },
    /// A reader found the blob unusable; drop the entry it saw
    DropIfStale {
        key: CacheKey,
        revision: u64,
    },
    /// The caller already claimed the maintenance slot
    Maintain {
        reply: Option<oneshot::Sender<MaintenanceReport>>,
    },
    Sweep {
        reply: oneshot::Sender<Result<SweepReport>>,
    },
    Clear {
        reply: oneshot::Sender<Result<usize>>,
    },
    Flush {
        reply: oneshot::Sender<Result<bool>>,
    },
}

#[derive(Clone)]
pub(crate) struct IoHandle {
    tx: mpsc::UnboundedSender<IoOp>,
}

impl IoHandle {
    pub fn send(&self, op: IoOp) -> Result<()> {
        self.tx
            .send(op)
            .map_err(|_| CacheError::shutdown("queue disk operation"))
    }

    /// Queue an op carrying a reply channel and wait for the lane's answer
    pub async fn request<T, F>(&self, operation: &'static str, make: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> IoOp,
    {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(make(tx))
            .map_err(|_| CacheError::shutdown(operation))?;
        rx.await.map_err(|_| CacheError::shutdown(operation))
    }
}

/// Start the lane on the current tokio runtime
pub(crate) fn spawn(shared: Arc<Shared>) -> IoHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(shared, rx));
    IoHandle { tx }
}

async fn run(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<IoOp>) {
    while let Some(op) = rx.recv().await {
        apply(&shared, op).await;
    }

    match shared.index.persist().await {
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "failed to persist index on shutdown"),
    }
    tracing::debug!("io lane stopped");
}

async fn apply(shared: &Shared, op: IoOp) {
    match op {
        IoOp::Store { entry, meta, seq } => {
            let key = meta.key.clone();
            write_entry(shared, &entry, meta).await;
            shared.pending.complete(&key, seq);

            if shared.over_capacity() && shared.try_begin_maintenance() {
                maintenance::run_pass(shared).await;
                shared.end_maintenance();
            }
        }
        IoOp::Remove { key, seq } => {
            if shared.index.remove(&key).is_some() {
                delete_blob(shared, &key).await;
            }
            shared.pending.complete(&key, seq);
        }
        IoOp::DropIfStale { key, revision } => {
            if shared.index.remove_if_revision(&key, revision).is_some() {
                tracing::debug!(key = %key, "dropped index entry with unusable blob");
                delete_blob(shared, &key).await;
            }
        }
        IoOp::Maintain { reply } => {
            let report = maintenance::run_pass(shared).await;
            shared.end_maintenance();
            if let Some(reply) = reply {
                let _ = reply.send(report);
            }
        }
        IoOp::Sweep { reply } => {
            let result = shared.blobs.sweep(|key| shared.index.contains_key(key)).await;
            let _ = reply.send(result);
        }
        IoOp::Clear { reply } => {
            let removed = shared.index.clear();
            let result = match shared.blobs.clear().await {
                Ok(()) => shared.index.persist().await.map(|_| removed),
                Err(e) => Err(e),
            };
            let _ = reply.send(result);
        }
        IoOp::Flush { reply } => {
            let _ = reply.send(shared.index.persist().await);
        }
    }
}

async fn write_entry(shared: &Shared, entry: &CachedResponse, meta: CacheEntryMetadata) {
    let key = meta.key.clone();
    let written: Result<u64> = async {
        let data = format::encode(
            key.as_str(),
            entry.status,
            &entry.headers,
            &entry.body,
            &entry.url,
        )?;
        shared.blobs.write(&key, &data).await
    }
    .await;

    match written {
        Ok(_) => {
            shared.index.insert(meta);
            CacheStats::bump(&shared.stats.disk_stores);
            tracing::trace!(key = %key, "stored entry on disk");
        }
        Err(e) => {
            CacheStats::bump(&shared.stats.blob_failures);
            tracing::warn!(key = %key, error = %e, "disk store failed");

            // whatever was there before is no longer the latest response
            if shared.index.remove(&key).is_some() {
                delete_blob(shared, &key).await;
            }

            if e.needs_eviction() && shared.try_begin_maintenance() {
                maintenance::run_pass(shared).await;
                shared.end_maintenance();
            }
        }
    }
}

pub(crate) async fn delete_blob(shared: &Shared, key: &CacheKey) {
    match shared.blobs.delete(key).await {
        Ok(_) => {}
        Err(e) => {
            CacheStats::bump(&shared.stats.blob_failures);
            tracing::warn!(key = %key, error = %e, "failed to delete blob");
        }
    }
}
