use crate::config::{CacheConfig, CacheConfigBuilder};
use crate::core::UrlCache;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use urlcache_core::{Clock, HttpRequest, HttpResponse, ManualClock};

mod advanced;

/// Small thresholds so tests can steer placement by body size:
/// bodies up to 100 bytes fit memory, disk holds 1000 bytes.
pub(super) fn test_config(root: &Path) -> CacheConfigBuilder {
    CacheConfigBuilder::new()
        .with_root(root)
        .with_memory_capacity(10_000)
        .with_max_memory_cache_item_size(100)
        .with_disk_capacity(1000)
        .with_maintenance_interval(Duration::from_secs(3600))
}

pub(super) async fn open(config: CacheConfig, clock: &Arc<ManualClock>) -> UrlCache {
    let clock: Arc<dyn Clock> = clock.clone();
    UrlCache::open_with_clock(config, clock).await.unwrap()
}

pub(super) fn request(path: &str) -> HttpRequest {
    HttpRequest::parse("GET", &format!("https://example.com/{path}")).unwrap()
}

pub(super) fn response(clock: &ManualClock, size: usize, ttl_secs: i64) -> HttpResponse {
    HttpResponse::new(200, vec![b'x'; size])
        .with_expires_at(clock.now() + chrono::Duration::seconds(ttl_secs))
}

/// Two hours: past both the disk minimum and the memory interval
pub(super) const LONG_TTL: i64 = 2 * 60 * 60;
