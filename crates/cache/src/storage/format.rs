//! Blob file format
//!
//! ```text
//! +--------+-----------------+---------------------------------------+
//! | "UCB1" | crc32c (u32 LE) | bincode(status, headers, body, url)   |
//! +--------+-----------------+---------------------------------------+
//! ```
//!
//! The checksum covers the payload only.

use crate::errors::{CacheError, RecoveryHint, Result, SerializationOp};
use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use std::path::Path;
use urlcache_core::Header;

/// Magic bytes at the start of every blob
pub const BLOB_MAGIC: [u8; 4] = *b"UCB1";

/// Magic plus checksum
pub const BLOB_HEADER_LEN: usize = 8;

/// Borrowed view used when encoding, avoids copying the body
#[derive(Serialize)]
struct BlobRecordRef<'a> {
    status: u16,
    headers: &'a [Header],
    body: &'a [u8],
    url: &'a str,
}

/// Decoded contents of a blob
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlobRecord {
    pub status: u16,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
    pub url: String,
}

pub fn encode(key: &str, status: u16, headers: &[Header], body: &[u8], url: &str) -> Result<Vec<u8>> {
    let record = BlobRecordRef {
        status,
        headers,
        body,
        url,
    };
    let payload = bincode::serialize(&record)
        .map_err(|e| CacheError::serialization(key, SerializationOp::Encode, e))?;

    let mut out = Vec::with_capacity(BLOB_HEADER_LEN + payload.len());
    out.extend_from_slice(&BLOB_MAGIC);
    out.extend_from_slice(&crc32c(&payload).to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

pub fn decode(key: &str, path: &Path, data: &[u8]) -> Result<BlobRecord> {
    let corrupt = |reason: String| CacheError::CorruptBlob {
        key: key.to_string(),
        path: path.to_path_buf(),
        reason,
        recovery_hint: RecoveryHint::TreatAsMiss,
    };

    if data.len() < BLOB_HEADER_LEN {
        return Err(corrupt(format!("blob too short: {} bytes", data.len())));
    }
    if data[..4] != BLOB_MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }

    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&data[4..BLOB_HEADER_LEN]);
    let expected = u32::from_le_bytes(crc_bytes);
    let payload = &data[BLOB_HEADER_LEN..];
    let actual = crc32c(payload);
    if actual != expected {
        return Err(corrupt(format!(
            "checksum mismatch: expected {expected:08x}, got {actual:08x}"
        )));
    }

    bincode::deserialize(payload)
        .map_err(|e| CacheError::serialization(key, SerializationOp::Decode, e))
}
