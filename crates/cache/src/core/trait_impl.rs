//! HttpCache implementation for UrlCache

use crate::entry::CachedResponse;
use crate::policy::Placement;
use crate::traits::HttpCache;
use async_trait::async_trait;
use urlcache_core::{HttpRequest, HttpResponse, StoragePolicy};

use super::types::UrlCache;

#[async_trait]
impl HttpCache for UrlCache {
    async fn lookup(&self, request: &HttpRequest) -> Option<CachedResponse> {
        UrlCache::lookup(self, request).await
    }

    fn store(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        storage_policy: StoragePolicy,
    ) -> Placement {
        UrlCache::store(self, request, response, storage_policy)
    }

    fn invalidate(&self, request: &HttpRequest) {
        UrlCache::invalidate(self, request)
    }
}
