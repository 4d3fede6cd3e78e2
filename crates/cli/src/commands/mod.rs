use anyhow::Context;
use clap::Subcommand;
use std::path::PathBuf;
use tracing::Instrument;
use urlcache_cache::config::INDEX_FILE_NAME;
use urlcache_cache::index::DiskIndex;
use urlcache_cache::{
    CacheConfig, CacheConfigBuilder, CacheConfigLoader, CacheEntryMetadata, CacheStatistics,
    Fingerprint, MaintenanceOutcome, UrlCache,
};
use urlcache_core::{Clock, HttpRequest, SystemClock};

#[derive(Subcommand)]
pub enum Commands {
    /// Show disk tier statistics (reads the index, changes nothing)
    Stats {
        /// Print statistics as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Remove expired entries, evict down to capacity and delete orphaned blobs
    Sweep,
    /// Remove every entry from the cache
    Clear,
    /// Report whether a URL is cached on disk (reads the index, changes nothing)
    Inspect {
        url: String,
        /// Request method the entry was stored under
        #[arg(long, default_value = "GET")]
        method: String,
    },
}

impl Commands {
    pub async fn execute(self, root: Option<PathBuf>) -> anyhow::Result<()> {
        let config = load_config(root)?;
        let span = match config.root_dir() {
            Ok(root) if config.enabled => urlcache_utils::tracing::cache_span(root),
            _ => tracing::Span::none(),
        };

        async move {
            match self {
                Commands::Stats { json } => stats(&config, json).await,
                Commands::Sweep => sweep(config).await,
                Commands::Clear => clear(config).await,
                Commands::Inspect { url, method } => inspect(&config, &method, &url).await,
            }
        }
        .instrument(span)
        .await
    }
}

fn load_config(root: Option<PathBuf>) -> anyhow::Result<CacheConfig> {
    let config = CacheConfigLoader::load().context("failed to load cache configuration")?;
    match root {
        Some(root) => Ok(CacheConfigBuilder::from_config(config).with_root(root).build()?),
        None => Ok(config),
    }
}

/// Open the cache for commands that modify it
///
/// Opening reconciles the index with the blob directory, which deletes
/// orphaned blob and temp files.
async fn open(config: CacheConfig) -> anyhow::Result<UrlCache> {
    let cache = UrlCache::open(config).await.context("failed to open cache")?;
    if !cache.is_enabled() {
        tracing::warn!("cache is disabled in configuration");
    }
    Ok(cache)
}

/// Load the persisted index without opening the cache
///
/// Nothing is created, swept or rewritten. `None` when the cache is disabled.
async fn read_index(config: &CacheConfig) -> anyhow::Result<Option<DiskIndex>> {
    if !config.enabled {
        tracing::warn!("cache is disabled in configuration");
        return Ok(None);
    }
    let root = config.root_dir()?;
    Ok(Some(DiskIndex::load(root.join(INDEX_FILE_NAME)).await))
}

async fn stats(config: &CacheConfig, json: bool) -> anyhow::Result<()> {
    let mut stats = CacheStatistics {
        memory_capacity_bytes: config.memory_capacity_bytes,
        disk_capacity_bytes: config.disk_capacity_bytes,
        ..CacheStatistics::default()
    };
    if let Some(index) = read_index(config).await? {
        stats.disk_entries = index.len();
        stats.disk_usage_bytes = index.total_usage_bytes();
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    tracing::info!("Cache Statistics:");
    tracing::info!("  Entries on disk: {}", stats.disk_entries);
    tracing::info!(
        "  Disk usage: {:.2} MB of {:.2} MB",
        megabytes(stats.disk_usage_bytes),
        megabytes(stats.disk_capacity_bytes)
    );
    tracing::info!(
        "  Memory capacity: {:.2} MB",
        megabytes(stats.memory_capacity_bytes)
    );
    Ok(())
}

async fn sweep(config: CacheConfig) -> anyhow::Result<()> {
    let cache = open(config).await?;
    match cache.run_maintenance().await? {
        MaintenanceOutcome::Completed(report) => {
            tracing::info!(
                "✓ Removed {} expired and evicted {} entries, freed {:.2} MB",
                report.expired,
                report.evicted,
                megabytes(report.freed_bytes)
            );
        }
        MaintenanceOutcome::Skipped => {
            tracing::info!("Maintenance already in progress, skipped");
        }
    }

    let orphans = cache.sweep_orphans().await?;
    tracing::info!(
        "✓ Deleted {} orphaned blobs and {} temp files",
        orphans.orphaned_blobs,
        orphans.temp_files
    );
    cache.flush().await?;
    Ok(())
}

async fn clear(config: CacheConfig) -> anyhow::Result<()> {
    let cache = open(config).await?;
    let removed = cache.clear().await?;
    tracing::info!("✓ Cleared {removed} disk entries");
    Ok(())
}

/// Index entry for `method url` and whether it is still live
async fn find_entry(
    config: &CacheConfig,
    method: &str,
    url: &str,
) -> anyhow::Result<Option<(CacheEntryMetadata, bool)>> {
    let request = HttpRequest::parse(method, url).with_context(|| format!("invalid URL '{url}'"))?;
    let Some(index) = read_index(config).await? else {
        return Ok(None);
    };
    let key = Fingerprint::compute_key(&request);
    Ok(index.get(&key).map(|meta| {
        let live = !meta.is_expired(SystemClock.now());
        (meta, live)
    }))
}

async fn inspect(config: &CacheConfig, method: &str, url: &str) -> anyhow::Result<()> {
    match find_entry(config, method, url).await? {
        Some((meta, live)) => {
            if live {
                tracing::info!("✓ {method} {url} is cached");
            } else {
                tracing::info!("✗ {method} {url} is indexed but expired");
            }
            tracing::info!("  Key: {}", meta.key);
            tracing::info!("  Size: {} bytes", meta.size_bytes);
            tracing::info!("  Stored at: {}", meta.stored_at);
            tracing::info!("  Expires at: {}", meta.expires_at);
            tracing::info!("  Tier: {:?}", meta.tier);
        }
        None => tracing::info!("✗ {method} {url} is not cached"),
    }
    Ok(())
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;
    use urlcache_core::{HttpResponse, StoragePolicy};

    fn config(root: &Path) -> CacheConfig {
        CacheConfigBuilder::new().with_root(root).build().unwrap()
    }

    fn plant_orphan(root: &Path) -> PathBuf {
        let orphan = root
            .join("blobs")
            .join("ab")
            .join(format!("{}.blob", "ab".repeat(32)));
        std::fs::create_dir_all(orphan.parent().unwrap()).unwrap();
        std::fs::write(&orphan, b"orphan").unwrap();
        orphan
    }

    #[tokio::test]
    async fn test_stats_and_inspect_leave_cache_dir_untouched() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let orphan = plant_orphan(dir.path());

        stats(&config, false).await.unwrap();
        stats(&config, true).await.unwrap();
        inspect(&config, "GET", "https://example.com/").await.unwrap();

        assert!(orphan.exists());
        assert!(!dir.path().join(INDEX_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_find_entry_reads_persisted_index() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let url = "https://example.com/feed";

        {
            let cache = UrlCache::open(config.clone()).await.unwrap();
            let request = HttpRequest::parse("GET", url).unwrap();
            let response = HttpResponse::new(200, vec![b'x'; 128])
                .with_expires_at(SystemClock.now() + chrono::Duration::hours(2));
            cache.store(&request, &response, StoragePolicy::Allowed);
            cache.flush().await.unwrap();
        }

        let (meta, live) = find_entry(&config, "GET", url).await.unwrap().unwrap();
        assert!(live);
        assert_eq!(meta.size_bytes, 128);
        assert!(find_entry(&config, "POST", url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_orphans() {
        let dir = TempDir::new().unwrap();
        let orphan = plant_orphan(dir.path());

        sweep(config(dir.path())).await.unwrap();
        assert!(!orphan.exists());
    }
}
