//! Byte-bounded in-process tier
//!
//! Entries are kept in recency order; inserting past the byte capacity drops
//! least recently used entries until the new one fits. Expired entries are
//! removed lazily when a lookup finds them.

use crate::entry::CachedResponse;
use crate::keys::CacheKey;
use lru::LruCache;
use parking_lot::Mutex;
use urlcache_core::Timestamp;

struct MemoryState {
    entries: LruCache<CacheKey, CachedResponse>,
    usage_bytes: u64,
}

pub struct MemoryTier {
    state: Mutex<MemoryState>,
    capacity_bytes: u64,
    max_item_bytes: u64,
}

impl MemoryTier {
    pub fn new(capacity_bytes: u64, max_item_bytes: u64) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                entries: LruCache::unbounded(),
                usage_bytes: 0,
            }),
            capacity_bytes,
            max_item_bytes: max_item_bytes.min(capacity_bytes),
        }
    }

    /// Fetch a live entry and mark it recently used
    pub fn get(&self, key: &CacheKey, now: Timestamp) -> Option<CachedResponse> {
        let mut state = self.state.lock();
        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            if let Some(entry) = state.entries.pop(key) {
                state.usage_bytes -= entry.size_bytes();
                tracing::trace!(key = %key, "memory entry expired");
            }
        }
        None
    }

    /// Whether a live entry exists, without touching recency
    pub fn contains(&self, key: &CacheKey, now: Timestamp) -> bool {
        let state = self.state.lock();
        state
            .entries
            .peek(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Insert or replace an entry; returns false if it can never fit
    pub fn insert(&self, key: CacheKey, entry: CachedResponse) -> bool {
        let size = entry.size_bytes();
        if size > self.max_item_bytes {
            return false;
        }

        let mut state = self.state.lock();
        put_locked(&mut state, self.capacity_bytes, key, entry);
        true
    }

    /// Insert only if `still_current` holds, checked under the tier's lock
    ///
    /// Removals and inserts from other callers cannot interleave between the
    /// check and the insert.
    pub fn insert_if<F>(&self, key: CacheKey, entry: CachedResponse, still_current: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        if entry.size_bytes() > self.max_item_bytes {
            return false;
        }

        let mut state = self.state.lock();
        if !still_current() {
            return false;
        }
        put_locked(&mut state, self.capacity_bytes, key, entry);
        true
    }

    pub fn remove(&self, key: &CacheKey) -> Option<CachedResponse> {
        let mut state = self.state.lock();
        let entry = state.entries.pop(key)?;
        state.usage_bytes -= entry.size_bytes();
        Some(entry)
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.usage_bytes = 0;
    }

    pub fn usage_bytes(&self) -> u64 {
        self.state.lock().usage_bytes
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }
}

fn put_locked(state: &mut MemoryState, capacity_bytes: u64, key: CacheKey, entry: CachedResponse) {
    let size = entry.size_bytes();
    if let Some(previous) = state.entries.pop(&key) {
        state.usage_bytes -= previous.size_bytes();
    }

    while state.usage_bytes + size > capacity_bytes {
        match state.entries.pop_lru() {
            Some((evicted, old)) => {
                state.usage_bytes -= old.size_bytes();
                tracing::trace!(key = %evicted, bytes = old.size_bytes(), "memory entry evicted");
            }
            None => break,
        }
    }

    state.usage_bytes += size;
    state.entries.put(key, entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LookupSource;
    use bytes::Bytes;
    use chrono::{DateTime, Duration};

    fn now() -> Timestamp {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn key(n: u8) -> CacheKey {
        CacheKey::from_hex(&format!("{n:02x}").repeat(32)).unwrap()
    }

    fn entry(size: usize, ttl_secs: i64) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: Vec::new(),
            body: Bytes::from(vec![b'x'; size]),
            url: "https://example.com/".to_string(),
            stored_at: now(),
            expires_at: now() + Duration::seconds(ttl_secs),
            source: LookupSource::Memory,
        }
    }

    #[test]
    fn test_get_after_insert() {
        let tier = MemoryTier::new(1000, 500);
        assert!(tier.insert(key(1), entry(100, 60)));
        assert_eq!(tier.get(&key(1), now()).unwrap().body.len(), 100);
        assert_eq!(tier.usage_bytes(), 100);
    }

    #[test]
    fn test_oversized_item_is_refused() {
        let tier = MemoryTier::new(1000, 500);
        assert!(!tier.insert(key(1), entry(501, 60)));
        assert!(tier.is_empty());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let tier = MemoryTier::new(300, 300);
        tier.insert(key(1), entry(100, 60));
        tier.insert(key(2), entry(100, 60));
        tier.insert(key(3), entry(100, 60));

        // touch 1 so 2 becomes the eviction candidate
        tier.get(&key(1), now());
        tier.insert(key(4), entry(100, 60));

        assert!(tier.contains(&key(1), now()));
        assert!(!tier.contains(&key(2), now()));
        assert!(tier.contains(&key(4), now()));
        assert_eq!(tier.usage_bytes(), 300);
    }

    #[test]
    fn test_expired_entries_are_lazily_removed() {
        let tier = MemoryTier::new(1000, 500);
        tier.insert(key(1), entry(100, 10));

        let later = now() + Duration::seconds(10);
        assert!(!tier.contains(&key(1), later));
        assert_eq!(tier.usage_bytes(), 100);

        assert!(tier.get(&key(1), later).is_none());
        assert_eq!(tier.usage_bytes(), 0);
        assert!(tier.is_empty());
    }

    #[test]
    fn test_insert_if_checks_condition() {
        let tier = MemoryTier::new(1000, 500);
        assert!(!tier.insert_if(key(1), entry(100, 60), || false));
        assert!(tier.is_empty());
        assert_eq!(tier.usage_bytes(), 0);

        assert!(tier.insert_if(key(1), entry(100, 60), || true));
        assert_eq!(tier.usage_bytes(), 100);
        assert!(!tier.insert_if(key(2), entry(501, 60), || true));
    }

    #[test]
    fn test_replace_does_not_double_count() {
        let tier = MemoryTier::new(1000, 500);
        tier.insert(key(1), entry(100, 60));
        tier.insert(key(1), entry(100, 60));
        assert_eq!(tier.usage_bytes(), 100);
        assert_eq!(tier.len(), 1);

        tier.remove(&key(1));
        assert_eq!(tier.usage_bytes(), 0);
    }
}
