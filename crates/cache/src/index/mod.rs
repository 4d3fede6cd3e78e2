//! Disk index: the single source of truth for what exists on disk
//!
//! Holds `CacheKey -> CacheEntryMetadata` for every disk-tier entry plus the
//! running `total_disk_usage_bytes`, which equals the sum of entry sizes after
//! every completed mutation. Readers take a shared lock; mutations come from
//! the IO lane only.
//!
//! Persistence is deferred. Mutations bump a generation counter and set the
//! dirty flag; [`DiskIndex::persist`] writes a snapshot and clears the flag
//! only if no mutation happened while it was writing.
//!
//! Every insert also stamps the entry with a revision, the generation at
//! which it was written. Entries loaded from disk start at revision 0.
//! Callers that act on an entry they read earlier compare revisions, not
//! timestamps, to tell whether it was replaced in the meantime.

mod persist;

pub use persist::INDEX_VERSION;

use crate::entry::CacheEntryMetadata;
use crate::errors::{CacheError, RecoveryHint, Result};
use crate::keys::CacheKey;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use urlcache_core::Timestamp;

#[derive(Default)]
struct IndexState {
    entries: HashMap<CacheKey, CacheEntryMetadata>,
    revisions: HashMap<CacheKey, u64>,
    total_bytes: u64,
    dirty: bool,
    generation: u64,
}

impl IndexState {
    fn touch(&mut self) {
        self.dirty = true;
        self.generation += 1;
    }

    fn take(&mut self, key: &CacheKey) -> Option<CacheEntryMetadata> {
        let removed = self.entries.remove(key)?;
        self.revisions.remove(key);
        self.total_bytes -= removed.size_bytes;
        self.touch();
        Some(removed)
    }
}

pub struct DiskIndex {
    path: PathBuf,
    state: RwLock<IndexState>,
}

impl DiskIndex {
    /// An empty index that persists to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Load the index at `path`
    ///
    /// Never fails: a missing file yields an empty index, an unreadable or
    /// corrupt one is logged and replaced by an empty, dirty index so the next
    /// persist overwrites it.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let index = Self::new(&path);

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no index file, starting empty");
                return index;
            }
            Err(e) => {
                index.reset_after_corruption(e.to_string());
                return index;
            }
        };

        match persist::decode(&data) {
            Ok((entries, total_bytes)) => {
                let mut state = index.state.write();
                state.total_bytes = total_bytes;
                state.revisions = entries.keys().map(|key| (key.clone(), 0)).collect();
                state.entries = entries;
                tracing::debug!(
                    path = %path.display(),
                    entries = state.entries.len(),
                    bytes = state.total_bytes,
                    "loaded disk index"
                );
            }
            Err(reason) => index.reset_after_corruption(reason),
        }

        index
    }

    fn reset_after_corruption(&self, reason: String) {
        let error = CacheError::IndexCorruption {
            path: self.path.clone(),
            reason,
            recovery_hint: RecoveryHint::RebuildIndex,
        };
        tracing::warn!(error = %error, "discarding unreadable disk index");
        self.state.write().touch();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata for a live entry; expired entries read as absent
    pub fn lookup(&self, key: &CacheKey, now: Timestamp) -> Option<CacheEntryMetadata> {
        self.state
            .read()
            .entries
            .get(key)
            .filter(|meta| !meta.is_expired(now))
            .cloned()
    }

    /// Live metadata together with the revision it was written at
    pub fn lookup_revision(
        &self,
        key: &CacheKey,
        now: Timestamp,
    ) -> Option<(CacheEntryMetadata, u64)> {
        let state = self.state.read();
        let meta = state.entries.get(key).filter(|meta| !meta.is_expired(now))?;
        let revision = state.revisions.get(key).copied().unwrap_or(0);
        Some((meta.clone(), revision))
    }

    /// Revision of the current entry for `key`, expired or not
    pub fn revision(&self, key: &CacheKey) -> Option<u64> {
        let state = self.state.read();
        state
            .entries
            .contains_key(key)
            .then(|| state.revisions.get(key).copied().unwrap_or(0))
    }

    /// Metadata regardless of expiry
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntryMetadata> {
        self.state.read().entries.get(key).cloned()
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.state.read().entries.contains_key(key)
    }

    /// Insert or overwrite, returning the previous metadata
    pub fn insert(&self, meta: CacheEntryMetadata) -> Option<CacheEntryMetadata> {
        let mut state = self.state.write();
        let key = meta.key.clone();
        let size_bytes = meta.size_bytes;
        let previous = state.entries.insert(key.clone(), meta);
        if let Some(prev) = &previous {
            state.total_bytes -= prev.size_bytes;
        }
        state.total_bytes = state.total_bytes.saturating_add(size_bytes);
        state.touch();
        let revision = state.generation;
        state.revisions.insert(key, revision);
        previous
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntryMetadata> {
        self.state.write().take(key)
    }

    /// Remove `key` only if its entry is still at `revision`
    pub fn remove_if_revision(&self, key: &CacheKey, revision: u64) -> Option<CacheEntryMetadata> {
        let mut state = self.state.write();
        let current = state.entries.contains_key(key)
            && state.revisions.get(key).copied().unwrap_or(0) == revision;
        if !current {
            return None;
        }
        state.take(key)
    }

    /// Remove every entry whose expiry has passed
    pub fn remove_expired(&self, now: Timestamp) -> Vec<CacheKey> {
        self.remove_where(|meta| meta.is_expired(now))
    }

    /// Remove every entry `predicate` matches
    pub fn remove_where<F>(&self, predicate: F) -> Vec<CacheKey>
    where
        F: Fn(&CacheEntryMetadata) -> bool,
    {
        let mut state = self.state.write();
        let doomed: Vec<CacheKey> = state
            .entries
            .values()
            .filter(|meta| predicate(meta))
            .map(|meta| meta.key.clone())
            .collect();
        for key in &doomed {
            state.take(key);
        }
        doomed
    }

    /// Evict oldest entries first until usage is at most `target_bytes`
    ///
    /// Recency is `stored_at`; ties go to the larger entry first, then key
    /// order so the result is deterministic.
    pub fn evict_until(&self, target_bytes: u64) -> Vec<CacheKey> {
        let mut state = self.state.write();
        if state.total_bytes <= target_bytes {
            return Vec::new();
        }

        let mut candidates: Vec<(Timestamp, Reverse<u64>, CacheKey)> = state
            .entries
            .values()
            .map(|m| (m.stored_at, Reverse(m.size_bytes), m.key.clone()))
            .collect();
        candidates.sort_unstable();

        let mut evicted = Vec::new();
        for (_, _, key) in candidates {
            if state.total_bytes <= target_bytes {
                break;
            }
            if state.take(&key).is_some() {
                evicted.push(key);
            }
        }
        evicted
    }

    pub fn clear(&self) -> usize {
        let mut state = self.state.write();
        let removed = state.entries.len();
        state.entries.clear();
        state.revisions.clear();
        state.total_bytes = 0;
        state.touch();
        removed
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.state.read().entries.keys().cloned().collect()
    }

    pub fn total_usage_bytes(&self) -> u64 {
        self.state.read().total_bytes
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_dirty(&self) -> bool {
        self.state.read().dirty
    }

    /// Write the index file if dirty; returns whether a write happened
    pub async fn persist(&self) -> Result<bool> {
        let (data, generation) = {
            let state = self.state.read();
            if !state.dirty {
                return Ok(false);
            }
            let data = persist::encode(&state.entries, state.total_bytes).map_err(|e| {
                CacheError::serialization(
                    self.path.display().to_string(),
                    crate::errors::SerializationOp::Encode,
                    e,
                )
            })?;
            (data, state.generation)
        };

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || urlcache_utils::write_atomic(&path, &data))
            .await
            .map_err(|_| CacheError::shutdown("persist index"))??;

        let mut state = self.state.write();
        if state.generation == generation {
            state.dirty = false;
        }
        tracing::debug!(path = %self.path.display(), "persisted disk index");
        Ok(true)
    }
}
