//! Eviction, restart and failure-recovery tests

use super::{open, request, response, test_config, LONG_TTL};
use crate::errors::Result;
use crate::maintenance::MaintenanceOutcome;
use crate::policy::Placement;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use urlcache_core::{ManualClock, StoragePolicy};

#[tokio::test]
async fn test_store_over_capacity_evicts_oldest() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let cache = open(test_config(dir.path()).build()?, &clock).await;

    for name in ["a", "b", "c"] {
        cache.store(&request(name), &response(&clock, 400, LONG_TTL), StoragePolicy::Allowed);
        clock.advance(Duration::from_secs(1));
    }
    cache.flush().await?;

    assert_eq!(cache.current_disk_usage_bytes(), 800);
    assert!(!cache.is_cached(&request("a")));
    assert!(cache.is_cached(&request("b")));
    assert!(cache.is_cached(&request("c")));
    assert_eq!(cache.stats().evictions, 1);
    Ok(())
}

#[tokio::test]
async fn test_maintenance_removes_expired_before_evicting() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let cache = open(test_config(dir.path()).build()?, &clock).await;

    cache.store(&request("old"), &response(&clock, 400, 600), StoragePolicy::Allowed);
    clock.advance(Duration::from_secs(1));
    cache.store(&request("new"), &response(&clock, 400, LONG_TTL), StoragePolicy::Allowed);
    cache.flush().await?;

    clock.advance(Duration::from_secs(600));
    let MaintenanceOutcome::Completed(report) = cache.run_maintenance().await? else {
        panic!("maintenance should not be busy");
    };
    assert_eq!(report.expired, 1);
    assert_eq!(report.evicted, 0);
    assert_eq!(report.freed_bytes, 400);
    assert!(report.persisted);
    assert_eq!(cache.current_disk_usage_bytes(), 400);
    assert!(cache.is_cached(&request("new")));
    Ok(())
}

#[tokio::test]
async fn test_run_maintenance_skips_when_busy() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let cache = open(test_config(dir.path()).build()?, &clock).await;
    let shared = &cache.inner.as_ref().unwrap().shared;

    assert!(shared.try_begin_maintenance());
    assert_eq!(cache.run_maintenance().await?, MaintenanceOutcome::Skipped);
    shared.end_maintenance();

    assert!(matches!(
        cache.run_maintenance().await?,
        MaintenanceOutcome::Completed(_)
    ));
    assert!(!shared.maintenance_busy());
    Ok(())
}

#[tokio::test]
async fn test_lowering_capacity_triggers_eviction() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let cache = open(test_config(dir.path()).build()?, &clock).await;

    for name in ["a", "b"] {
        cache.store(&request(name), &response(&clock, 400, LONG_TTL), StoragePolicy::Allowed);
        clock.advance(Duration::from_secs(1));
    }
    cache.flush().await?;

    cache.set_disk_capacity(500);
    assert_eq!(cache.disk_capacity(), 500);
    cache.flush().await?;

    assert_eq!(cache.current_disk_usage_bytes(), 400);
    assert!(cache.is_cached(&request("b")));
    Ok(())
}

#[tokio::test]
async fn test_response_larger_than_disk_is_rejected_from_disk() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let config = test_config(dir.path())
        .with_disk_capacity(50)
        .build()?;
    let cache = open(config, &clock).await;

    let big = request("big");
    assert_eq!(
        cache.store(&big, &response(&clock, 400, LONG_TTL), StoragePolicy::Allowed),
        Placement::Reject
    );

    let small = request("small");
    assert_eq!(
        cache.store(&small, &response(&clock, 80, LONG_TTL), StoragePolicy::Allowed),
        Placement::Memory
    );
    cache.flush().await?;
    assert_eq!(cache.current_disk_usage_bytes(), 0);
    Ok(())
}

#[tokio::test]
async fn test_memory_only_policy_respects_override_flag() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());

    let strict = open(test_config(dir.path()).with_disk_override(false).build()?, &clock).await;
    assert_eq!(
        strict.store(
            &request("m"),
            &response(&clock, 80, LONG_TTL),
            StoragePolicy::AllowedInMemoryOnly
        ),
        Placement::Memory
    );
    drop(strict);

    let other = TempDir::new().unwrap();
    let lenient = open(test_config(other.path()).build()?, &clock).await;
    assert_eq!(
        lenient.store(
            &request("m"),
            &response(&clock, 80, LONG_TTL),
            StoragePolicy::AllowedInMemoryOnly
        ),
        Placement::Both
    );
    Ok(())
}

#[tokio::test]
async fn test_shorter_restore_drops_disk_copy() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let cache = open(test_config(dir.path()).build()?, &clock).await;

    let req = request("shrinking");
    cache.store(&req, &response(&clock, 80, LONG_TTL), StoragePolicy::Allowed);
    cache.flush().await?;
    assert_eq!(cache.current_disk_usage_bytes(), 80);

    assert_eq!(
        cache.store(&req, &response(&clock, 60, 60), StoragePolicy::Allowed),
        Placement::Memory
    );
    cache.flush().await?;
    assert_eq!(cache.current_disk_usage_bytes(), 0);
    assert_eq!(cache.lookup(&req).await.unwrap().body.len(), 60);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_blob_is_a_miss_and_repaired() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let cache = open(test_config(dir.path()).build()?, &clock).await;

    let req = request("corrupt");
    cache.store(&req, &response(&clock, 400, LONG_TTL), StoragePolicy::Allowed);
    cache.flush().await?;

    let inner = cache.inner.as_ref().unwrap();
    let key = crate::keys::Fingerprint::compute_key(&req);
    std::fs::write(inner.shared.blobs.path_for(&key), b"not a blob").unwrap();

    assert!(cache.lookup(&req).await.is_none());
    cache.flush().await?;
    assert!(!cache.is_cached(&req));
    assert_eq!(cache.current_disk_usage_bytes(), 0);
    assert_eq!(cache.stats().blob_failures, 1);
    Ok(())
}

#[tokio::test]
async fn test_entries_survive_reopen() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let req = request("persisted");
    let resp = response(&clock, 400, LONG_TTL);

    {
        let cache = open(test_config(dir.path()).build()?, &clock).await;
        cache.store(&req, &resp, StoragePolicy::Allowed);
        assert!(cache.flush().await?);
    }

    let cache = open(test_config(dir.path()).build()?, &clock).await;
    assert!(cache.is_cached(&req));
    assert_eq!(cache.current_disk_usage_bytes(), 400);
    assert_eq!(cache.lookup(&req).await.unwrap().body, resp.body);
    Ok(())
}

#[tokio::test]
async fn test_clear_empties_everything() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::fixed());
    let cache = open(test_config(dir.path()).build()?, &clock).await;

    cache.store(&request("a"), &response(&clock, 80, LONG_TTL), StoragePolicy::Allowed);
    cache.store(&request("b"), &response(&clock, 400, LONG_TTL), StoragePolicy::Allowed);

    assert_eq!(cache.clear().await?, 2);
    assert_eq!(cache.current_disk_usage_bytes(), 0);
    assert_eq!(cache.current_memory_usage_bytes(), 0);
    assert!(!cache.is_cached(&request("a")));
    assert!(cache.inner.as_ref().unwrap().shared.blobs.list_keys().await?.is_empty());
    Ok(())
}
