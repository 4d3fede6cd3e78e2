//! Disk usage always equals the sum of the indexed entry sizes

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use urlcache_cache::{CacheConfigBuilder, UrlCache};
use urlcache_core::{Clock, HttpRequest, HttpResponse, ManualClock, StoragePolicy};

#[derive(Debug, Clone)]
enum Op {
    Store { path: u8, size: usize, ttl_secs: i64 },
    Invalidate(u8),
    Advance(u64),
    Maintain,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..6, 0usize..600, prop_oneof![Just(60i64), Just(600), Just(7200)])
            .prop_map(|(path, size, ttl_secs)| Op::Store { path, size, ttl_secs }),
        1 => (0u8..6).prop_map(Op::Invalidate),
        1 => (1u64..900).prop_map(Op::Advance),
        1 => Just(Op::Maintain),
    ]
}

fn request(path: u8) -> HttpRequest {
    HttpRequest::parse("GET", &format!("https://example.com/item/{path}")).unwrap()
}

async fn run(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let config = CacheConfigBuilder::new()
        .with_root(dir.path())
        .with_memory_capacity(2_000)
        .with_max_memory_cache_item_size(100)
        .with_disk_capacity(1_000)
        .with_maintenance_interval(Duration::from_secs(3600))
        .build()
        .unwrap();
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let cache = UrlCache::open_with_clock(config, dyn_clock).await.unwrap();

    for op in ops {
        match op {
            Op::Store { path, size, ttl_secs } => {
                let response = HttpResponse::new(200, vec![0u8; size])
                    .with_expires_at(clock.now() + chrono::Duration::seconds(ttl_secs));
                cache.store(&request(path), &response, StoragePolicy::Allowed);
            }
            Op::Invalidate(path) => cache.invalidate(&request(path)),
            Op::Advance(secs) => clock.advance(Duration::from_secs(secs)),
            Op::Maintain => {
                cache.flush().await.unwrap();
                cache.run_maintenance().await.unwrap();
            }
        }

        cache.flush().await.unwrap();
        let sum: u64 = (0u8..6)
            .filter_map(|path| cache.entry_metadata(&request(path)))
            .map(|meta| meta.size_bytes)
            .sum();
        prop_assert_eq!(cache.current_disk_usage_bytes(), sum);
        prop_assert!(cache.current_memory_usage_bytes() <= 2_000);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_disk_usage_matches_index(ops in proptest::collection::vec(op(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(ops))?;
    }
}
