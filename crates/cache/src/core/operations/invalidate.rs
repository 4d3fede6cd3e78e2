//! Explicit invalidation

use crate::core::internal::CacheStats;
use crate::core::types::UrlCache;
use crate::keys::Fingerprint;
use urlcache_core::HttpRequest;

impl UrlCache {
    /// Remove any cached response for `request` from both tiers
    ///
    /// The memory copy goes immediately; the disk removal is queued but
    /// lookups miss from this point on.
    pub fn invalidate(&self, request: &HttpRequest) {
        let Some(inner) = &self.inner else {
            return;
        };

        let key = Fingerprint::compute_key(request);
        // the pending removal must exist before memory is cleared
        inner.queue_removal(&key);
        inner.memory.remove(&key);
        CacheStats::bump(&inner.shared.stats.invalidations);
        tracing::debug!(key = %key, "invalidated");
    }
}
