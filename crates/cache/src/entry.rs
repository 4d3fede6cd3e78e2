//! Cache entry metadata and the responses handed back to callers

use crate::keys::CacheKey;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use urlcache_core::{Header, HttpResponse, StoragePolicy, Timestamp};

/// Where an entry was placed when it was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Memory,
    Disk,
    Both,
}

impl Tier {
    pub fn includes_memory(self) -> bool {
        matches!(self, Tier::Memory | Tier::Both)
    }

    pub fn includes_disk(self) -> bool {
        matches!(self, Tier::Disk | Tier::Both)
    }
}

/// Metadata for one disk-tier entry, owned by the disk index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryMetadata {
    pub key: CacheKey,
    pub size_bytes: u64,
    pub stored_at: Timestamp,
    /// Set once at creation; authoritative for validity
    pub expires_at: Timestamp,
    pub tier: Tier,
}

impl CacheEntryMetadata {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Which structure satisfied a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Memory,
    /// A disk write that the IO lane has not applied yet
    PendingWrite,
    Disk,
}

/// A cached response as returned by [`crate::UrlCache::lookup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<Header>,
    pub body: Bytes,
    /// Normalized URL of the request that produced this response
    pub url: String,
    pub stored_at: Timestamp,
    pub expires_at: Timestamp,
    pub source: LookupSource,
}

impl CachedResponse {
    pub(crate) fn from_response(
        response: &HttpResponse,
        url: String,
        stored_at: Timestamp,
        expires_at: Timestamp,
    ) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            url,
            stored_at,
            expires_at,
            source: LookupSource::Memory,
        }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Body plus header bytes, the same measure used at store time
    pub fn size_bytes(&self) -> u64 {
        let headers: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len())
            .sum();
        (self.body.len() + headers) as u64
    }

    pub(crate) fn with_source(mut self, source: LookupSource) -> Self {
        self.source = source;
        self
    }

    /// Turn the cached copy back into a transport response
    pub fn into_response(self) -> HttpResponse {
        HttpResponse {
            status: self.status,
            headers: self.headers,
            body: self.body,
            expires_at: Some(self.expires_at),
            storage_policy: StoragePolicy::Allowed,
        }
    }
}
