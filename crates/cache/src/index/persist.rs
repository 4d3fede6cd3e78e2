//! Index file encoding
//!
//! ```json
//! { "version": 1, "total_disk_usage_bytes": 800,
//!   "entries": { "<key>": { "size_bytes": 400, "stored_at": "...", "expires_at": "...", "tier": "disk" } } }
//! ```
//!
//! The stored total is informational; loading recomputes it from the entries.

use crate::entry::{CacheEntryMetadata, Tier};
use crate::keys::CacheKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use urlcache_core::Timestamp;

pub const INDEX_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct IndexFile {
    pub version: u32,
    pub total_disk_usage_bytes: u64,
    pub entries: BTreeMap<CacheKey, IndexRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct IndexRecord {
    pub size_bytes: u64,
    pub stored_at: Timestamp,
    pub expires_at: Timestamp,
    pub tier: Tier,
}

pub(crate) fn encode(
    entries: &HashMap<CacheKey, CacheEntryMetadata>,
    total_bytes: u64,
) -> serde_json::Result<Vec<u8>> {
    let file = IndexFile {
        version: INDEX_VERSION,
        total_disk_usage_bytes: total_bytes,
        entries: entries
            .iter()
            .map(|(key, meta)| {
                (
                    key.clone(),
                    IndexRecord {
                        size_bytes: meta.size_bytes,
                        stored_at: meta.stored_at,
                        expires_at: meta.expires_at,
                        tier: meta.tier,
                    },
                )
            })
            .collect(),
    };
    serde_json::to_vec_pretty(&file)
}

/// Decoded entries and their total size, or a human readable reason the
/// file is unusable
pub(crate) fn decode(data: &[u8]) -> Result<(HashMap<CacheKey, CacheEntryMetadata>, u64), String> {
    let file: IndexFile = serde_json::from_slice(data).map_err(|e| e.to_string())?;
    if file.version != INDEX_VERSION {
        return Err(format!("unsupported index version {}", file.version));
    }

    let entries: HashMap<_, _> = file
        .entries
        .into_iter()
        .map(|(key, record)| {
            let meta = CacheEntryMetadata {
                key: key.clone(),
                size_bytes: record.size_bytes,
                stored_at: record.stored_at,
                expires_at: record.expires_at,
                tier: record.tier,
            };
            (key, meta)
        })
        .collect();

    let recomputed = entries
        .values()
        .try_fold(0u64, |total, meta| total.checked_add(meta.size_bytes))
        .ok_or_else(|| "usage overflow".to_string())?;
    if recomputed != file.total_disk_usage_bytes {
        tracing::debug!(
            recorded = file.total_disk_usage_bytes,
            recomputed,
            "index usage total disagreed with entries"
        );
    }

    Ok((entries, recomputed))
}
