//! HTTP data model shared between the transport collaborator and the cache
//!
//! The transport owns everything about HTTP semantics. By the time a response
//! reaches the cache it already carries a parsed expiration time and a storage
//! policy hint; the cache never looks at `Cache-Control` itself.

use crate::errors::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Wall-clock timestamp used for every stored/expiry time
pub type Timestamp = DateTime<Utc>;

/// A single header as a (name, value) pair, order preserved
pub type Header = (String, String);

/// Where a response is allowed to be stored, as decided by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoragePolicy {
    /// Any tier
    #[default]
    Allowed,
    /// Memory only, unless the cache is configured to override it
    AllowedInMemoryOnly,
    /// Never cache
    NotAllowed,
}

impl StoragePolicy {
    pub fn permits_memory(self) -> bool {
        !matches!(self, StoragePolicy::NotAllowed)
    }

    /// Whether disk storage is allowed, given the memory-only override flag
    pub fn permits_disk(self, allow_disk_override: bool) -> bool {
        match self {
            StoragePolicy::Allowed => true,
            StoragePolicy::AllowedInMemoryOnly => allow_disk_override,
            StoragePolicy::NotAllowed => false,
        }
    }
}

impl std::fmt::Display for StoragePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoragePolicy::Allowed => "allowed",
            StoragePolicy::AllowedInMemoryOnly => "allowed-in-memory-only",
            StoragePolicy::NotAllowed => "not-allowed",
        };
        f.write_str(name)
    }
}

/// An outgoing request as seen by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<Header>,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// Build a request from a textual URL
    pub fn parse(method: impl Into<String>, url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::invalid_url(url, e))?;
        Ok(Self::new(method, parsed))
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Case-insensitive header lookup, first match wins
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A response as delivered by the transport, with pre-computed metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<Header>,
    pub body: Bytes,
    /// Already-parsed expiration; `None` means the transport found none
    pub expires_at: Option<Timestamp>,
    pub storage_policy: StoragePolicy,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            expires_at: None,
            storage_policy: StoragePolicy::Allowed,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn with_storage_policy(mut self, policy: StoragePolicy) -> Self {
        self.storage_policy = policy;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Remaining lifetime at `now`; `None` when expired or no expiry is known
    pub fn time_to_live(&self, now: Timestamp) -> Option<Duration> {
        let expires_at = self.expires_at?;
        (expires_at - now).to_std().ok().filter(|ttl| !ttl.is_zero())
    }

    /// Approximate in-memory footprint: body plus header bytes
    pub fn size_bytes(&self) -> u64 {
        let headers: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.len() + value.len())
            .sum();
        (self.body.len() + headers) as u64
    }
}

fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
