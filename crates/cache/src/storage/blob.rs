//! Blob files addressed by cache key
//!
//! Pure storage: no notion of validity. Blobs live at
//! `blobs/<first two hex chars>/<key>.blob`; writes go to a temporary sibling
//! and are renamed into place so readers never see a partial blob.

use crate::errors::{CacheError, RecoveryHint, Result};
use crate::keys::CacheKey;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const BLOB_EXTENSION: &str = "blob";

/// What a sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub orphaned_blobs: usize,
    pub temp_files: usize,
    pub freed_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir
            .join(key.shard())
            .join(format!("{key}.{BLOB_EXTENSION}"))
    }

    /// Write `data` as the blob for `key`, replacing any previous one
    pub async fn write(&self, key: &CacheKey, data: &[u8]) -> Result<u64> {
        let path = self.path_for(key);
        let requested = data.len() as u64;
        let blob_err = |op: &'static str, e: std::io::Error| {
            CacheError::blob_io(key.as_str(), &path, op, e, requested)
        };

        if let Some(parent) = path.parent() {
            match fs::create_dir_all(parent).await {
                Ok(()) => {}
                Err(e) => return Err(blob_err("create shard directory", e)),
            }
        }

        let temp_path = urlcache_utils::temp_path_for(&path)?;
        let written: std::io::Result<()> = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(blob_err("write temporary blob", e));
        }

        match fs::rename(&temp_path, &path).await {
            Ok(()) => Ok(requested),
            Err(e) => {
                let _ = fs::remove_file(&temp_path).await;
                Err(blob_err("rename blob into place", e))
            }
        }
    }

    /// Raw bytes of the blob for `key`, `None` if there is none
    pub async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::blob_io(key.as_str(), &path, "read", e, 0)),
        }
    }

    /// Delete the blob for `key`; returns whether one existed
    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::blob_io(key.as_str(), &path, "delete", e, 0)),
        }
    }

    pub async fn exists(&self, key: &CacheKey) -> bool {
        fs::try_exists(self.path_for(key)).await.unwrap_or(false)
    }

    /// Every key with a blob on disk, in no particular order
    pub async fn list_keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for path in self.list_files().await? {
            if let Some(key) = key_from_path(&path) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Remove temp files, stray files and every blob whose key `keep` rejects
    pub async fn sweep<F>(&self, keep: F) -> Result<SweepReport>
    where
        F: Fn(&CacheKey) -> bool,
    {
        let mut report = SweepReport::default();

        for path in self.list_files().await? {
            let is_temp = urlcache_utils::is_temp_file(&path);
            let orphan = match key_from_path(&path) {
                Some(key) => !keep(&key),
                None => true,
            };
            if !is_temp && !orphan {
                continue;
            }

            let size = fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
            match fs::remove_file(&path).await {
                Ok(()) => {
                    report.freed_bytes += size;
                    if is_temp {
                        report.temp_files += 1;
                    } else {
                        report.orphaned_blobs += 1;
                    }
                    tracing::debug!(path = %path.display(), bytes = size, "swept blob file");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to sweep blob file");
                }
            }
        }

        Ok(report)
    }

    /// Delete every blob and recreate the empty directory
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(self.dir_error("remove blob directory", e)),
        }
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.dir_error("create blob directory", e))
    }

    async fn list_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut shards = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(self.dir_error("list blob directory", e)),
        };

        while let Some(shard) = shards
            .next_entry()
            .await
            .map_err(|e| self.dir_error("list blob directory", e))?
        {
            let shard_path = shard.path();
            let is_dir = shard.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                files.push(shard_path);
                continue;
            }

            let mut entries = fs::read_dir(&shard_path)
                .await
                .map_err(|e| self.dir_error("list blob shard", e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| self.dir_error("list blob shard", e))?
            {
                files.push(entry.path());
            }
        }

        Ok(files)
    }

    fn dir_error(&self, operation: &str, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.dir.clone(),
            operation: operation.to_string(),
            source,
            recovery_hint: RecoveryHint::CheckPermissions {
                path: self.dir.clone(),
            },
        }
    }
}

/// Key encoded in a blob path, if the path is a well-formed blob location
fn key_from_path(path: &Path) -> Option<CacheKey> {
    if path.extension()? != BLOB_EXTENSION {
        return None;
    }
    let key = CacheKey::from_hex(path.file_stem()?.to_str()?)?;
    let shard = path.parent()?.file_name()?.to_str()?;
    (shard == key.shard()).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(n: u8) -> CacheKey {
        CacheKey::from_hex(&format!("{n:02x}").repeat(32)).unwrap()
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));

        assert_eq!(store.write(&key(1), b"payload").await.unwrap(), 7);
        assert_eq!(store.read(&key(1)).await.unwrap().unwrap(), b"payload");
        assert!(store.path_for(&key(1)).starts_with(dir.path().join("blobs").join("01")));

        assert!(store.delete(&key(1)).await.unwrap());
        assert!(!store.delete(&key(1)).await.unwrap());
        assert!(store.read(&key(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_content() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));

        store.write(&key(2), b"first").await.unwrap();
        store.write(&key(2), b"second").await.unwrap();
        assert_eq!(store.read(&key(2)).await.unwrap().unwrap(), b"second");
        assert_eq!(store.list_keys().await.unwrap(), vec![key(2)]);
    }

    #[tokio::test]
    async fn test_sweep_removes_orphans_and_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));

        store.write(&key(1), b"keep").await.unwrap();
        store.write(&key(2), b"orphan").await.unwrap();
        let shard = store.path_for(&key(1)).parent().unwrap().to_path_buf();
        std::fs::write(shard.join(".leftover.tmp"), b"partial").unwrap();

        let report = store.sweep(|k| *k == key(1)).await.unwrap();
        assert_eq!(report.orphaned_blobs, 1);
        assert_eq!(report.temp_files, 1);
        assert_eq!(report.freed_bytes, 6 + 7);
        assert_eq!(store.list_keys().await.unwrap(), vec![key(1)]);
    }

    #[tokio::test]
    async fn test_clear_and_missing_dir() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        assert!(store.list_keys().await.unwrap().is_empty());

        store.write(&key(3), b"x").await.unwrap();
        store.clear().await.unwrap();
        assert!(store.list_keys().await.unwrap().is_empty());
        assert!(store.dir().is_dir());
    }
}
