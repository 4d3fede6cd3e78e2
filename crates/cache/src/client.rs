//! Transport wrapper that consults a cache first

use crate::traits::{HttpCache, Transport, TransportError};
use urlcache_core::{HttpRequest, HttpResponse};

/// Serves hits from `cache`, otherwise fetches through `transport` and
/// offers the live response to the cache
pub struct CachingClient<T, C> {
    transport: T,
    cache: C,
}

impl<T, C> CachingClient<T, C>
where
    T: Transport,
    C: HttpCache,
{
    pub fn new(transport: T, cache: C) -> Self {
        Self { transport, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Some(cached) = self.cache.lookup(request).await {
            tracing::debug!(url = %request.url, "served from cache");
            return Ok(cached.into_response());
        }

        let response = self.transport.fetch(request).await?;
        let placement = self.cache.store(request, &response, response.storage_policy);
        tracing::debug!(url = %request.url, placement = ?placement, "fetched from network");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CachedResponse;
    use crate::policy::Placement;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use urlcache_core::StoragePolicy;

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn fetch(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TransportError::new("connection refused"));
            }
            Ok(HttpResponse::new(200, "live").with_expires_at(Utc::now() + Duration::hours(1)))
        }
    }

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<String, CachedResponse>>,
    }

    #[async_trait]
    impl HttpCache for MapCache {
        async fn lookup(&self, request: &HttpRequest) -> Option<CachedResponse> {
            self.entries.lock().get(request.url.as_str()).cloned()
        }

        fn store(&self, request: &HttpRequest, response: &HttpResponse, _: StoragePolicy) -> Placement {
            let now = Utc::now();
            let cached = CachedResponse::from_response(
                response,
                request.url.to_string(),
                now,
                response.expires_at.unwrap_or(now),
            );
            self.entries.lock().insert(request.url.to_string(), cached);
            Placement::Memory
        }

        fn invalidate(&self, request: &HttpRequest) {
            self.entries.lock().remove(request.url.as_str());
        }
    }

    #[tokio::test]
    async fn test_second_send_is_served_from_cache() {
        let client = CachingClient::new(CountingTransport::default(), MapCache::default());
        let request = HttpRequest::parse("GET", "https://example.com/a").unwrap();

        let first = client.send(&request).await.unwrap();
        let second = client.send(&request).await.unwrap();

        assert_eq!(first.body, second.body);
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 1);

        client.cache().invalidate(&request);
        client.send(&request).await.unwrap();
        assert_eq!(client.transport().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_transport_errors_pass_through() {
        let transport = CountingTransport {
            fail: true,
            ..CountingTransport::default()
        };
        let client = CachingClient::new(transport, MapCache::default());
        let request = HttpRequest::parse("GET", "https://example.com/a").unwrap();

        let err = client.send(&request).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(client.cache().entries.lock().is_empty());
    }
}
