//! Conversions into cache errors

use super::types::{CacheError, RecoveryHint, SerializationOp};
use std::path::Path;
use std::time::Duration;

impl From<urlcache_core::Error> for CacheError {
    fn from(error: urlcache_core::Error) -> Self {
        match error {
            urlcache_core::Error::FileSystem {
                path,
                operation,
                source,
            } => CacheError::Io {
                recovery_hint: RecoveryHint::CheckPermissions { path: path.clone() },
                path,
                operation,
                source,
            },
            urlcache_core::Error::Configuration { message } => CacheError::Configuration {
                message,
                recovery_hint: RecoveryHint::UpdateConfiguration,
            },
            other => CacheError::Configuration {
                message: other.to_string(),
                recovery_hint: RecoveryHint::UpdateConfiguration,
            },
        }
    }
}

impl CacheError {
    /// Configuration error with the standard hint
    pub fn configuration(message: impl Into<String>) -> Self {
        CacheError::Configuration {
            message: message.into(),
            recovery_hint: RecoveryHint::UpdateConfiguration,
        }
    }

    /// Blob I/O failure; out-of-space errors become [`CacheError::DiskFull`]
    pub fn blob_io(
        key: &str,
        path: &Path,
        operation: &'static str,
        source: std::io::Error,
        requested_bytes: u64,
    ) -> Self {
        if is_storage_full(&source) {
            return CacheError::DiskFull {
                requested_bytes,
                capacity_bytes: 0,
                recovery_hint: RecoveryHint::RunEviction,
            };
        }
        CacheError::BlobIo {
            key: key.to_string(),
            path: path.to_path_buf(),
            operation,
            recovery_hint: match source.kind() {
                std::io::ErrorKind::PermissionDenied => RecoveryHint::CheckPermissions {
                    path: path.to_path_buf(),
                },
                std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock => {
                    RecoveryHint::Retry {
                        after: Duration::from_millis(10),
                    }
                }
                _ => RecoveryHint::TreatAsMiss,
            },
            source,
        }
    }

    pub fn serialization(
        key: impl Into<String>,
        operation: SerializationOp,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        CacheError::Serialization {
            key: key.into(),
            operation,
            source: source.into(),
            recovery_hint: RecoveryHint::TreatAsMiss,
        }
    }

    pub fn shutdown(operation: &'static str) -> Self {
        CacheError::Shutdown {
            operation,
            recovery_hint: RecoveryHint::Manual {
                instructions: "Reopen the cache".to_string(),
            },
        }
    }
}

/// Whether an I/O error means the file system ran out of space or quota
pub fn is_storage_full(error: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        matches!(error.raw_os_error(), Some(code) if code == libc::ENOSPC || code == libc::EDQUOT)
    }
    #[cfg(not(unix))]
    {
        let _ = error;
        false
    }
}
