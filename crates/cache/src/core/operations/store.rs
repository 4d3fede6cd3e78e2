//! Store path: placement decision, memory insert and queued disk write

use crate::core::internal::CacheStats;
use crate::core::types::{CacheInner, UrlCache};
use crate::entry::{CacheEntryMetadata, CachedResponse};
use crate::errors::{CacheError, RecoveryHint};
use crate::executor::{IoOp, Pending};
use crate::keys::{normalize_url, CacheKey, Fingerprint};
use crate::policy::{Placement, PolicyInput};
use std::sync::Arc;
use urlcache_core::{HttpRequest, HttpResponse, StoragePolicy};

impl UrlCache {
    /// Store `response` for `request` wherever policy allows
    ///
    /// Returns where the response went. Memory placement happens before this
    /// returns; disk placement is queued on the IO lane but is visible to
    /// `lookup` and `is_cached` immediately. Storing replaces any copy in a
    /// tier the new placement does not use. A rejected response leaves an
    /// existing entry untouched.
    pub fn store(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        storage_policy: StoragePolicy,
    ) -> Placement {
        let Some(inner) = &self.inner else {
            return Placement::Reject;
        };

        let key = Fingerprint::compute_key(request);
        let now = inner.shared.now();
        let size_bytes = response.size_bytes();
        let time_to_live = response.time_to_live(now);

        let mut placement = inner.policy.decide(&PolicyInput {
            size_bytes,
            time_to_live,
            storage_policy,
            allow_disk_override: self.config.allow_disk_override_for_memory_only_policy,
        });

        let capacity = inner.shared.disk_capacity();
        if placement.includes_disk() && size_bytes > capacity {
            let error = CacheError::DiskFull {
                requested_bytes: size_bytes,
                capacity_bytes: capacity,
                recovery_hint: RecoveryHint::IncreaseCapacity {
                    suggested_bytes: size_bytes,
                },
            };
            tracing::warn!(key = %key, error = %error, "response larger than disk tier");
            placement = placement.without_disk();
        }

        let (Some(tier), Some(expires_at)) = (placement.tier(), response.expires_at) else {
            CacheStats::bump(&inner.shared.stats.rejections);
            tracing::trace!(key = %key, policy = %storage_policy, "store rejected");
            return Placement::Reject;
        };

        let entry = CachedResponse::from_response(response, normalize_url(&request.url), now, expires_at);

        // disk side first: lookups only promote a disk hit to memory while
        // no disk mutation is pending for the key
        if placement.includes_disk() {
            let meta = CacheEntryMetadata {
                key: key.clone(),
                size_bytes,
                stored_at: now,
                expires_at,
                tier,
            };
            if !inner.queue_write(&key, Arc::new(entry.clone()), meta) {
                placement = placement.without_disk();
                if placement.is_reject() {
                    CacheStats::bump(&inner.shared.stats.rejections);
                }
            }
        } else if inner.has_disk_copy(&key) {
            inner.queue_removal(&key);
        }

        if placement.includes_memory() {
            inner.memory.insert(key.clone(), entry);
            CacheStats::bump(&inner.shared.stats.memory_stores);
        } else {
            inner.memory.remove(&key);
        }

        tracing::debug!(key = %key, bytes = size_bytes, placement = ?placement, "stored response");
        placement
    }
}

impl CacheInner {
    fn queue_write(&self, key: &CacheKey, entry: Arc<CachedResponse>, meta: CacheEntryMetadata) -> bool {
        let pending = Pending::Write(Arc::clone(&entry));
        let queued = self.shared.pending.record(key, pending, |seq| {
            self.io.send(IoOp::Store { entry, meta, seq }).is_ok()
        });
        if !queued {
            tracing::warn!(key = %key, error = %CacheError::shutdown("store"), "disk write not queued");
        }
        queued
    }

    pub(crate) fn queue_removal(&self, key: &CacheKey) -> bool {
        let queued = self.shared.pending.record(key, Pending::Remove, |seq| {
            self.io
                .send(IoOp::Remove {
                    key: key.clone(),
                    seq,
                })
                .is_ok()
        });
        if !queued {
            tracing::warn!(key = %key, error = %CacheError::shutdown("invalidate"), "disk removal not queued");
        }
        queued
    }

    fn has_disk_copy(&self, key: &CacheKey) -> bool {
        self.shared.pending.get(key).is_some() || self.shared.index.contains_key(key)
    }
}
