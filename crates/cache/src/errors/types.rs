//! Core error types for the cache system

use std::path::PathBuf;
use std::time::Duration;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Error type for cache operations
#[derive(Debug)]
pub enum CacheError {
    /// Invalid capacity, path or threshold at construction
    Configuration {
        message: String,
        recovery_hint: RecoveryHint,
    },

    /// The persisted index could not be read or parsed
    IndexCorruption {
        path: PathBuf,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// Reading, writing or deleting one entry's blob failed
    BlobIo {
        key: String,
        path: PathBuf,
        operation: &'static str,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// A blob was present but its contents failed validation
    CorruptBlob {
        key: String,
        path: PathBuf,
        reason: String,
        recovery_hint: RecoveryHint,
    },

    /// A store could not complete for lack of disk space or capacity
    DiskFull {
        requested_bytes: u64,
        capacity_bytes: u64,
        recovery_hint: RecoveryHint,
    },

    /// I/O errors outside a single entry (cache root, index file)
    Io {
        path: PathBuf,
        operation: String,
        source: std::io::Error,
        recovery_hint: RecoveryHint,
    },

    /// Serialization/deserialization errors
    Serialization {
        key: String,
        operation: SerializationOp,
        source: Box<dyn std::error::Error + Send + Sync>,
        recovery_hint: RecoveryHint,
    },

    /// The background I/O lane is no longer running
    Shutdown {
        operation: &'static str,
        recovery_hint: RecoveryHint,
    },
}

/// Recovery hints for error handling
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryHint {
    /// Retry the operation
    Retry { after: Duration },

    /// Check file permissions
    CheckPermissions { path: PathBuf },

    /// Start from an empty index; orphaned blobs are swept
    RebuildIndex,

    /// Run a maintenance pass to free disk space
    RunEviction,

    /// Raise the disk capacity
    IncreaseCapacity { suggested_bytes: u64 },

    /// Fix the cache configuration
    UpdateConfiguration,

    /// Serve the request from the network instead
    TreatAsMiss,

    /// No automated recovery possible
    Manual { instructions: String },

    /// Operation can be safely ignored
    Ignore,
}

/// Serialization operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationOp {
    Encode,
    Decode,
}
