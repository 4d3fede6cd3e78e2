//! Recovery utilities for cache errors

use super::types::{CacheError, RecoveryHint};

impl CacheError {
    /// Get the recovery hint for this error
    #[must_use]
    pub const fn recovery_hint(&self) -> &RecoveryHint {
        match self {
            Self::Configuration { recovery_hint, .. }
            | Self::IndexCorruption { recovery_hint, .. }
            | Self::BlobIo { recovery_hint, .. }
            | Self::CorruptBlob { recovery_hint, .. }
            | Self::DiskFull { recovery_hint, .. }
            | Self::Io { recovery_hint, .. }
            | Self::Serialization { recovery_hint, .. }
            | Self::Shutdown { recovery_hint, .. } => recovery_hint,
        }
    }

    /// Only configuration errors stop the cache from being constructed
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Failure confined to a single entry's blob
    #[must_use]
    pub const fn is_blob_failure(&self) -> bool {
        matches!(self, Self::BlobIo { .. } | Self::CorruptBlob { .. })
    }

    /// Whether maintenance should run to recover
    #[must_use]
    pub const fn needs_eviction(&self) -> bool {
        matches!(self.recovery_hint(), RecoveryHint::RunEviction)
    }

    /// Check if this error is transient and can be retried
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.recovery_hint(), RecoveryHint::Retry { .. })
    }
}
