//! Capability interfaces between the cache and its collaborators
//!
//! Transports depend on [`HttpCache`], never on [`crate::UrlCache`] directly.

use crate::entry::CachedResponse;
use crate::policy::Placement;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use urlcache_core::{HttpRequest, HttpResponse, StoragePolicy, Timestamp};

/// What a transport needs from a cache
#[async_trait]
pub trait HttpCache: Send + Sync {
    async fn lookup(&self, request: &HttpRequest) -> Option<CachedResponse>;

    fn store(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        storage_policy: StoragePolicy,
    ) -> Placement;

    fn invalidate(&self, request: &HttpRequest);
}

/// Fetches live responses on a cache miss
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Failure reported by a [`Transport`]; passed through untouched
#[derive(Debug)]
pub struct TransportError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transport error: {}", self.message)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStatistics {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub memory_stores: u64,
    pub disk_stores: u64,
    pub rejections: u64,
    pub invalidations: u64,
    pub blob_failures: u64,
    pub expired_removals: u64,
    pub evictions: u64,
    pub maintenance_runs: u64,
    pub memory_entries: usize,
    pub memory_usage_bytes: u64,
    pub memory_capacity_bytes: u64,
    pub disk_entries: usize,
    pub disk_usage_bytes: u64,
    pub disk_capacity_bytes: u64,
    /// Disk mutations queued but not yet applied
    pub pending_disk_ops: usize,
    pub stats_since: Option<Timestamp>,
}

impl CacheStatistics {
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.disk_hits
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}
