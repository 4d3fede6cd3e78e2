//! Request fingerprinting
//!
//! A [`CacheKey`] is the lowercase hex SHA-256 of a canonical description of
//! the request. The canonical form is built from:
//!
//! - the method, uppercased (`get` and `GET` are the same request)
//! - the URL after [`normalize_url`], which applies exactly these rules:
//!   scheme and host lowercased, default port dropped, dot segments resolved,
//!   empty path written as `/` (all done by URL parsing), the fragment
//!   removed, an empty query (`?` alone) removed, and percent-escapes written
//!   in uppercase hex
//! - for methods that are not idempotent (anything but GET, HEAD, OPTIONS,
//!   PUT, DELETE, TRACE) the SHA-256 of the request body
//!
//! Trailing slashes on non-root paths are kept: `/docs` and `/docs/` are
//! distinct resources. Query parameter order is kept. Headers never take part
//! in the key.

mod normalize;

pub use normalize::{normalize_method, normalize_url};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use urlcache_core::HttpRequest;

/// Length of a key in hex characters
pub const KEY_HEX_LEN: usize = 64;

/// Opaque, deterministic identifier for a cacheable request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CacheKey(String);

impl CacheKey {
    /// Parse a key from its hex form; `None` unless it is 64 lowercase hex chars
    pub fn from_hex(hex: &str) -> Option<Self> {
        let valid = hex.len() == KEY_HEX_LEN
            && hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Two-character shard used to spread blobs over directories
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CacheKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CacheKey::from_hex(&value).ok_or_else(|| format!("invalid cache key '{value}'"))
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.0
    }
}

/// Derives cache keys from requests. Pure: no state, no I/O, no errors.
pub struct Fingerprint;

impl Fingerprint {
    pub fn compute_key(request: &HttpRequest) -> CacheKey {
        let method = normalize_method(&request.method);
        let url = normalize_url(&request.url);

        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update([0u8]);
        hasher.update(url.as_bytes());

        if !is_idempotent(&method) {
            let body_hash = Sha256::digest(request.body.as_deref().unwrap_or_default());
            hasher.update([0u8]);
            hasher.update(body_hash);
        }

        CacheKey(hex::encode(hasher.finalize()))
    }
}

/// Methods whose body does not change what the response is keyed on
fn is_idempotent(method: &str) -> bool {
    matches!(method, "GET" | "HEAD" | "OPTIONS" | "PUT" | "DELETE" | "TRACE")
}
