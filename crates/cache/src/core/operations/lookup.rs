//! Lookup path: memory, then queued writes, then the disk index and blob

use crate::core::internal::CacheStats;
use crate::core::types::{CacheInner, UrlCache};
use crate::entry::{CacheEntryMetadata, CachedResponse, LookupSource};
use crate::errors::{CacheError, Result};
use crate::executor::{IoOp, Pending};
use crate::keys::{CacheKey, Fingerprint};
use crate::storage::format;
use bytes::Bytes;
use urlcache_core::HttpRequest;

impl UrlCache {
    /// Cached response for `request`, if a live one exists
    ///
    /// Never fails: any problem reading the disk tier is logged and counts
    /// as a miss.
    pub async fn lookup(&self, request: &HttpRequest) -> Option<CachedResponse> {
        let inner = self.inner.as_ref()?;
        inner.lookup_key(&Fingerprint::compute_key(request)).await
    }

    /// Whether a live response is cached for `request`, without reading blobs
    pub fn is_cached(&self, request: &HttpRequest) -> bool {
        match &self.inner {
            Some(inner) => inner.is_cached_key(&Fingerprint::compute_key(request)),
            None => false,
        }
    }
}

impl CacheInner {
    pub(crate) async fn lookup_key(&self, key: &CacheKey) -> Option<CachedResponse> {
        let stats = &self.shared.stats;
        let now = self.shared.now();

        if let Some(hit) = self.memory.get(key, now) {
            CacheStats::bump(&stats.memory_hits);
            tracing::trace!(key = %key, "memory hit");
            return Some(hit.with_source(LookupSource::Memory));
        }

        match self.shared.pending.get(key) {
            Some(Pending::Write(entry)) if !entry.is_expired(now) => {
                CacheStats::bump(&stats.disk_hits);
                tracing::trace!(key = %key, "pending write hit");
                return Some(entry.as_ref().clone().with_source(LookupSource::PendingWrite));
            }
            Some(_) => {
                CacheStats::bump(&stats.misses);
                return None;
            }
            None => {}
        }

        let Some((meta, revision)) = self.shared.index.lookup_revision(key, now) else {
            CacheStats::bump(&stats.misses);
            tracing::trace!(key = %key, "miss");
            return None;
        };

        match self.read_blob(&meta).await {
            Ok(response) => {
                if meta.tier.includes_memory() {
                    self.promote(key, revision, response.clone());
                }
                CacheStats::bump(&stats.disk_hits);
                tracing::trace!(key = %key, "disk hit");
                Some(response)
            }
            Err(e) => {
                CacheStats::bump(&stats.blob_failures);
                CacheStats::bump(&stats.misses);
                tracing::warn!(key = %key, error = %e, "unreadable blob, treating as miss");
                let drop_op = IoOp::DropIfStale {
                    key: key.clone(),
                    revision,
                };
                if let Err(e) = self.io.send(drop_op) {
                    tracing::debug!(key = %key, error = %e, "could not queue index repair");
                }
                None
            }
        }
    }

    /// Copy a disk hit into memory unless the entry changed during the read
    ///
    /// The read happened without any lock held, so a store or invalidate may
    /// have run since. The copy is made only while no disk mutation is
    /// pending for `key` and the index still holds the revision that was
    /// read. Writers record their pending mutation before touching memory,
    /// so a stale copy that slips in ahead of the record is removed by the
    /// writer right after.
    pub(crate) fn promote(&self, key: &CacheKey, revision: u64, response: CachedResponse) -> bool {
        let shared = &self.shared;
        let promoted = self.memory.insert_if(key.clone(), response, || {
            !shared.pending.contains_key(key) && shared.index.revision(key) == Some(revision)
        });
        if !promoted {
            tracing::trace!(key = %key, "disk hit changed during read, not promoted");
        }
        promoted
    }

    pub(crate) fn is_cached_key(&self, key: &CacheKey) -> bool {
        let now = self.shared.now();
        if self.memory.contains(key, now) {
            return true;
        }
        match self.shared.pending.get(key) {
            Some(Pending::Write(entry)) => !entry.is_expired(now),
            Some(Pending::Remove) => false,
            None => self.shared.index.lookup(key, now).is_some(),
        }
    }

    async fn read_blob(&self, meta: &CacheEntryMetadata) -> Result<CachedResponse> {
        let blobs = &self.shared.blobs;
        let path = blobs.path_for(&meta.key);

        let data = match blobs.read(&meta.key).await? {
            Some(data) => data,
            None => {
                return Err(CacheError::blob_io(
                    meta.key.as_str(),
                    &path,
                    "read",
                    std::io::Error::new(std::io::ErrorKind::NotFound, "blob missing"),
                    0,
                ));
            }
        };

        let record = format::decode(meta.key.as_str(), &path, &data)?;
        Ok(CachedResponse {
            status: record.status,
            headers: record.headers,
            body: Bytes::from(record.body),
            url: record.url,
            stored_at: meta.stored_at,
            expires_at: meta.expires_at,
            source: LookupSource::Disk,
        })
    }
}
