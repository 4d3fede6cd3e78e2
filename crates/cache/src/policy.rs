//! Placement decisions for responses
//!
//! Rules, first match wins:
//!
//! 1. storage policy `NotAllowed`, or no remaining lifetime: reject
//! 2. lifetime below the minimum disk interval: memory, if it fits, else reject
//! 3. small and lifetime within the memory interval: memory
//! 4. disk permitted (directly, or a memory-only policy with the override):
//!    disk, plus memory when the size fits the memory tier
//! 5. otherwise memory if permitted and it fits, else reject
//!
//! The override never revives an expired response: it only widens where a
//! live response may go.

use crate::config::CacheConfig;
use crate::entry::Tier;
use std::time::Duration;
use urlcache_core::StoragePolicy;

/// Outcome of [`PolicyEngine::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Reject,
    Memory,
    Disk,
    Both,
}

impl Placement {
    pub fn includes_memory(self) -> bool {
        matches!(self, Placement::Memory | Placement::Both)
    }

    pub fn includes_disk(self) -> bool {
        matches!(self, Placement::Disk | Placement::Both)
    }

    pub fn is_reject(self) -> bool {
        self == Placement::Reject
    }

    /// Tier recorded for an accepted placement
    pub fn tier(self) -> Option<Tier> {
        match self {
            Placement::Reject => None,
            Placement::Memory => Some(Tier::Memory),
            Placement::Disk => Some(Tier::Disk),
            Placement::Both => Some(Tier::Both),
        }
    }

    /// What is left once the disk tier refuses the write
    pub fn without_disk(self) -> Placement {
        match self {
            Placement::Both | Placement::Memory => Placement::Memory,
            Placement::Disk | Placement::Reject => Placement::Reject,
        }
    }
}

/// Facts about one response that placement depends on
#[derive(Debug, Clone, Copy)]
pub struct PolicyInput {
    pub size_bytes: u64,
    /// `None` when already expired or no expiry is known
    pub time_to_live: Option<Duration>,
    pub storage_policy: StoragePolicy,
    pub allow_disk_override: bool,
}

/// Thresholds driving placement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyEngine {
    pub min_disk_cache_item_interval: Duration,
    pub max_memory_cache_item_interval: Duration,
    pub max_memory_cache_item_size: u64,
}

impl PolicyEngine {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            min_disk_cache_item_interval: config.min_disk_cache_item_interval,
            max_memory_cache_item_interval: config.max_memory_cache_item_interval,
            max_memory_cache_item_size: config.max_memory_cache_item_size,
        }
    }

    pub fn decide(&self, input: &PolicyInput) -> Placement {
        let ttl = match input.time_to_live {
            Some(ttl) if !ttl.is_zero() && input.storage_policy != StoragePolicy::NotAllowed => {
                ttl
            }
            _ => return Placement::Reject,
        };

        let fits_memory = input.size_bytes <= self.max_memory_cache_item_size;
        let memory_ok = input.storage_policy.permits_memory() && fits_memory;

        if ttl < self.min_disk_cache_item_interval {
            return if memory_ok {
                Placement::Memory
            } else {
                Placement::Reject
            };
        }

        if memory_ok && ttl <= self.max_memory_cache_item_interval {
            return Placement::Memory;
        }

        if input.storage_policy.permits_disk(input.allow_disk_override) {
            return if fits_memory {
                Placement::Both
            } else {
                Placement::Disk
            };
        }

        if memory_ok {
            Placement::Memory
        } else {
            Placement::Reject
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> PolicyEngine {
        PolicyEngine {
            min_disk_cache_item_interval: Duration::from_secs(300),
            max_memory_cache_item_interval: Duration::from_secs(3600),
            max_memory_cache_item_size: 1024,
        }
    }

    fn input(size: u64, ttl_secs: Option<u64>, policy: StoragePolicy) -> PolicyInput {
        PolicyInput {
            size_bytes: size,
            time_to_live: ttl_secs.map(Duration::from_secs),
            storage_policy: policy,
            allow_disk_override: false,
        }
    }

    #[test]
    fn test_rejects_uncacheable() {
        let engine = engine();
        assert_eq!(engine.decide(&input(10, None, StoragePolicy::Allowed)), Placement::Reject);
        assert_eq!(engine.decide(&input(10, Some(0), StoragePolicy::Allowed)), Placement::Reject);
        assert_eq!(
            engine.decide(&input(10, Some(10_000), StoragePolicy::NotAllowed)),
            Placement::Reject
        );

        let mut expired = input(10, None, StoragePolicy::AllowedInMemoryOnly);
        expired.allow_disk_override = true;
        assert_eq!(engine.decide(&expired), Placement::Reject);
    }

    #[test]
    fn test_short_lived_stays_in_memory() {
        // ttl 60s is under the 300s disk minimum
        let engine = engine();
        assert_eq!(engine.decide(&input(100, Some(60), StoragePolicy::Allowed)), Placement::Memory);
        assert_eq!(engine.decide(&input(4096, Some(60), StoragePolicy::Allowed)), Placement::Reject);
    }

    #[test]
    fn test_small_and_medium_lived_is_memory_only() {
        let engine = engine();
        assert_eq!(
            engine.decide(&input(100, Some(1800), StoragePolicy::Allowed)),
            Placement::Memory
        );
        assert_eq!(
            engine.decide(&input(100, Some(3600), StoragePolicy::Allowed)),
            Placement::Memory
        );
    }

    #[test]
    fn test_long_lived_goes_to_disk() {
        let engine = engine();
        assert_eq!(
            engine.decide(&input(100, Some(7200), StoragePolicy::Allowed)),
            Placement::Both
        );
        assert_eq!(
            engine.decide(&input(4096, Some(7200), StoragePolicy::Allowed)),
            Placement::Disk
        );
        assert_eq!(
            engine.decide(&input(4096, Some(600), StoragePolicy::Allowed)),
            Placement::Disk
        );
    }

    #[test]
    fn test_memory_only_policy_and_override() {
        let engine = engine();
        let mut small = input(100, Some(7200), StoragePolicy::AllowedInMemoryOnly);
        let mut large = input(4096, Some(7200), StoragePolicy::AllowedInMemoryOnly);

        assert_eq!(engine.decide(&small), Placement::Memory);
        assert_eq!(engine.decide(&large), Placement::Reject);

        small.allow_disk_override = true;
        large.allow_disk_override = true;
        assert_eq!(engine.decide(&small), Placement::Both);
        assert_eq!(engine.decide(&large), Placement::Disk);
    }

    #[test]
    fn test_without_disk() {
        assert_eq!(Placement::Both.without_disk(), Placement::Memory);
        assert_eq!(Placement::Disk.without_disk(), Placement::Reject);
        assert_eq!(Placement::Memory.without_disk(), Placement::Memory);
        assert_eq!(Placement::Both.tier(), Some(Tier::Both));
        assert_eq!(Placement::Reject.tier(), None);
    }
}
