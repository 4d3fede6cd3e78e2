//! Display implementations for cache errors

use super::types::{CacheError, RecoveryHint};
use std::fmt;

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { message, .. } => {
                write!(f, "Invalid cache configuration: {message}")
            }
            Self::IndexCorruption { path, reason, .. } => write!(
                f,
                "Cache index '{}' is unreadable: {reason}",
                path.display()
            ),
            Self::BlobIo {
                key,
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "Failed to {operation} blob for key '{key}' at '{}': {source}",
                path.display()
            ),
            Self::CorruptBlob {
                key, path, reason, ..
            } => write!(
                f,
                "Blob for key '{key}' at '{}' is corrupt: {reason}",
                path.display()
            ),
            Self::DiskFull {
                requested_bytes,
                capacity_bytes,
                ..
            } => write!(
                f,
                "Disk cache full: requested {requested_bytes} bytes with a capacity of {capacity_bytes} bytes"
            ),
            Self::Io {
                path,
                operation,
                source,
                ..
            } => write!(
                f,
                "I/O error during {} on '{}': {}",
                operation,
                path.display(),
                source
            ),
            Self::Serialization {
                key,
                operation,
                source,
                ..
            } => write!(f, "Failed to {operation:?} cache data '{key}': {source}"),
            Self::Shutdown { operation, .. } => {
                write!(f, "Cache I/O lane has shut down; cannot {operation}")
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BlobIo { source, .. } | Self::Io { source, .. } => Some(source),
            Self::Serialization { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for RecoveryHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry { after } => write!(f, "retry after {after:?}"),
            Self::CheckPermissions { path } => {
                write!(f, "check permissions on '{}'", path.display())
            }
            Self::RebuildIndex => f.write_str("rebuild the cache index"),
            Self::RunEviction => f.write_str("run cache maintenance"),
            Self::IncreaseCapacity { suggested_bytes } => {
                write!(f, "increase disk capacity to at least {suggested_bytes} bytes")
            }
            Self::UpdateConfiguration => f.write_str("update the cache configuration"),
            Self::TreatAsMiss => f.write_str("treat as a cache miss"),
            Self::Manual { instructions } => f.write_str(instructions),
            Self::Ignore => f.write_str("no action required"),
        }
    }
}
