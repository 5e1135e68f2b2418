//! Artifact storage backends
//!
//! The cache only sees path strings and raw bytes; where the bytes live is
//! up to the backend.

use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the full artifact at `path`
    ///
    /// Fails with [`CacheError::StorageNotFound`] when nothing exists there.
    async fn read(&self, path: &str) -> CacheResult<Vec<u8>>;

    /// Store an artifact, creating parent locations as needed
    async fn write(&self, path: &str, bytes: &[u8]) -> CacheResult<()>;

    /// Remove an artifact; removing a missing artifact succeeds
    async fn delete(&self, path: &str) -> CacheResult<()>;

    /// Confirm new artifacts can be stored
    async fn check_writable(&self) -> CacheResult<()> {
        Ok(())
    }
}

const HEALTH_CHECK_FILE: &str = ".health_check";

/// Local filesystem storage
///
/// Relative paths resolve against `root` when one is set.
#[derive(Debug, Clone, Default)]
pub struct FsStorage {
    root: Option<PathBuf>,
}

impl FsStorage {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) if Path::new(path).is_relative() => root.join(path),
            _ => PathBuf::from(path),
        }
    }
}

fn storage_error(path: &str, source: std::io::Error) -> CacheError {
    if source.kind() == ErrorKind::NotFound {
        CacheError::StorageNotFound {
            path: path.to_string(),
        }
    } else {
        CacheError::Storage {
            path: path.to_string(),
            source,
        }
    }
}

#[async_trait]
impl StorageBackend for FsStorage {
    async fn read(&self, path: &str) -> CacheResult<Vec<u8>> {
        let full = self.resolve(path);
        tracing::debug!(path = %full.display(), "Reading model artifact");
        tokio::fs::read(&full)
            .await
            .map_err(|e| storage_error(path, e))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> CacheResult<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(path, e))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| storage_error(path, e))?;

        tracing::debug!(path = %full.display(), size_bytes = bytes.len(), "Stored model artifact");
        Ok(())
    }

    async fn delete(&self, path: &str) -> CacheResult<()> {
        let full = self.resolve(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => {
                tracing::debug!(path = %full.display(), "Removed model artifact");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error(path, e)),
        }
    }

    /// Touch and remove a marker file under the root
    async fn check_writable(&self) -> CacheResult<()> {
        let marker = self.resolve(HEALTH_CHECK_FILE);
        let path = marker.to_string_lossy();
        if let Some(parent) = marker.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(&path, e))?;
        }
        tokio::fs::write(&marker, b"")
            .await
            .map_err(|e| storage_error(&path, e))?;
        tokio::fs::remove_file(&marker)
            .await
            .map_err(|e| storage_error(&path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let storage = FsStorage::new();
        let err = storage
            .read("/nonexistent/model-12345.json")
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::StorageNotFound { .. }));
    }

    #[tokio::test]
    async fn test_write_then_read_with_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::with_root(temp_dir.path());

        storage
            .write("iris/v1/model.json", b"{\"family\":\"constant\",\"value\":1}")
            .await
            .unwrap();

        assert!(temp_dir.path().join("iris/v1/model.json").exists());
        let bytes = storage.read("iris/v1/model.json").await.unwrap();
        assert!(bytes.starts_with(b"{\"family\""));
    }

    #[tokio::test]
    async fn test_absolute_path_ignores_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("abs.json");
        std::fs::write(&file, "x").unwrap();

        let storage = FsStorage::with_root("/does/not/matter");
        let bytes = storage.read(&file.to_string_lossy()).await.unwrap();
        assert_eq!(bytes, b"x");
    }

    #[tokio::test]
    async fn test_delete_removes_and_tolerates_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::with_root(temp_dir.path());
        storage.write("iris/v1/model.json", b"{}").await.unwrap();

        storage.delete("iris/v1/model.json").await.unwrap();
        assert!(!temp_dir.path().join("iris/v1/model.json").exists());
        storage.delete("iris/v1/model.json").await.unwrap();
    }

    #[tokio::test]
    async fn test_check_writable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::with_root(temp_dir.path().join("models"));
        storage.check_writable().await.unwrap();
        assert!(!temp_dir.path().join("models/.health_check").exists());

        // A regular file where the root directory should be
        let blocked = temp_dir.path().join("blocked");
        std::fs::write(&blocked, "x").unwrap();
        let storage = FsStorage::with_root(&blocked);
        assert!(storage.check_writable().await.is_err());
    }

    #[tokio::test]
    async fn test_read_directory_is_storage_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new();
        let err = storage
            .read(&temp_dir.path().to_string_lossy())
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Storage { .. }));
    }
}
