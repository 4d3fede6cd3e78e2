//! Disk mutations that have been queued but not yet applied
//!
//! The request path records every queued store or removal here before it
//! reaches the IO lane, so a lookup straight after `store` sees the new
//! response and a lookup straight after `invalidate` misses, without waiting
//! for disk. Each record carries a sequence number; the lane clears a record
//! only when the sequence it applied is still the latest one for that key.

use crate::entry::CachedResponse;
use crate::keys::CacheKey;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum Pending {
    Write(Arc<CachedResponse>),
    Remove,
}

#[derive(Default)]
pub struct PendingWrites {
    entries: DashMap<CacheKey, (u64, Pending)>,
    next_seq: AtomicU64,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `pending` for `key` and hand its sequence number to `enqueue`
    ///
    /// `enqueue` runs while the key's shard is locked, so for one key the
    /// order of sequence numbers matches the order ops reach the lane. If it
    /// returns false the record is rolled back.
    pub fn record<F>(&self, key: &CacheKey, pending: Pending, enqueue: F) -> bool
    where
        F: FnOnce(u64) -> bool,
    {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                let previous = std::mem::replace(slot.get_mut(), (seq, pending));
                if enqueue(seq) {
                    true
                } else {
                    *slot.get_mut() = previous;
                    false
                }
            }
            Entry::Vacant(slot) => {
                if enqueue(seq) {
                    slot.insert((seq, pending));
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Pending> {
        self.entries.get(key).map(|entry| entry.value().1.clone())
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop the record for `key` if `seq` is still the latest
    pub fn complete(&self, key: &CacheKey, seq: u64) {
        self.entries.remove_if(key, |_, (latest, _)| *latest == seq);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CacheKey {
        CacheKey::from_hex(&"ab".repeat(32)).unwrap()
    }

    #[test]
    fn test_only_latest_sequence_completes() {
        let pending = PendingWrites::new();
        let mut seqs = Vec::new();

        assert!(pending.record(&key(), Pending::Remove, |seq| {
            seqs.push(seq);
            true
        }));
        assert!(pending.record(&key(), Pending::Remove, |seq| {
            seqs.push(seq);
            true
        }));

        pending.complete(&key(), seqs[0]);
        assert!(pending.get(&key()).is_some());

        pending.complete(&key(), seqs[1]);
        assert!(pending.get(&key()).is_none());
        assert!(pending.is_empty());
    }

    #[test]
    fn test_failed_enqueue_rolls_back() {
        let pending = PendingWrites::new();
        assert!(!pending.record(&key(), Pending::Remove, |_| false));
        assert!(pending.is_empty());

        let mut first = 0;
        pending.record(&key(), Pending::Remove, |seq| {
            first = seq;
            true
        });
        assert!(!pending.record(&key(), Pending::Remove, |_| false));

        // the surviving record is still the first one
        pending.complete(&key(), first);
        assert!(pending.is_empty());
    }
}
