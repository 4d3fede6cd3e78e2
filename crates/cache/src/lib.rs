//! Two-tier cache for HTTP request/response pairs
//!
//! Small, short-lived responses stay in a byte-bounded memory tier; larger or
//! longer-lived ones go to a disk tier made of one blob file per entry and a
//! persisted index that accounts for every byte. A single background IO lane
//! applies all disk mutations in order, and a maintenance scheduler expires
//! and evicts entries to keep disk usage under capacity.
//!
//! ```no_run
//! # async fn demo() -> urlcache_cache::Result<()> {
//! use urlcache_cache::{CacheConfigBuilder, UrlCache};
//! use urlcache_core::{HttpRequest, HttpResponse};
//!
//! let config = CacheConfigBuilder::new().with_root("/tmp/urlcache").build()?;
//! let cache = UrlCache::open(config).await?;
//!
//! let request = HttpRequest::parse("GET", "https://example.com/feed")?;
//! # let response = HttpResponse::new(200, "hello");
//! cache.store(&request, &response, response.storage_policy);
//! let hit = cache.lookup(&request).await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod entry;
pub mod errors;
pub mod index;
pub mod keys;
pub mod maintenance;
pub mod memory;
pub mod policy;
pub mod storage;
pub mod traits;

pub(crate) mod executor;

pub use client::CachingClient;
pub use config::{CacheConfig, CacheConfigBuilder, CacheConfigLoader};
pub use core::UrlCache;
pub use entry::{CacheEntryMetadata, CachedResponse, LookupSource, Tier};
pub use errors::{CacheError, RecoveryHint, Result};
pub use keys::{CacheKey, Fingerprint};
pub use maintenance::{MaintenanceOutcome, MaintenanceReport};
pub use policy::{Placement, PolicyEngine, PolicyInput};
pub use storage::SweepReport;
pub use traits::{CacheStatistics, HttpCache, Transport, TransportError};
