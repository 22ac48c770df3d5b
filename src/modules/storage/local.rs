use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::BlobStore;
use crate::core::error::AppError;

/// Stores payloads as plain files under a media root directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create the store, creating the media root if it does not exist yet
    pub async fn new(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create media root '{}': {}",
                root.display(),
                e
            ))
        })?;

        info!("Local storage initialized at {}", root.display());
        Ok(Self { root })
    }

    /// Map a key to a path below the root. Keys that would escape it are rejected.
    fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(key);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));

        if key.is_empty() || !is_plain {
            return Err(AppError::Storage(format!("Invalid storage key '{}'", key)));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create '{}': {}", key, e)))?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write '{}': {}", key, e)))?;

        debug!("Stored '{}' at {}", key, path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Stored file '{}' not found", key)))
            }
            Err(e) => Err(AppError::Storage(format!("Failed to read '{}': {}", key, e))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted '{}'", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete '{}': {}", key, e))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let path = self.resolve(key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to check '{}': {}", key, e)))
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path()).await.unwrap();

        store
            .put("ab/cd/hello.txt", b"hello".to_vec(), "text/plain")
            .await
            .unwrap();
        assert!(store.exists("ab/cd/hello.txt").await.unwrap());
        assert_eq!(store.get("ab/cd/hello.txt").await.unwrap(), b"hello");

        store.delete("ab/cd/hello.txt").await.unwrap();
        assert!(!store.exists("ab/cd/hello.txt").await.unwrap());
        // Deleting twice is fine
        store.delete("ab/cd/hello.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path()).await.unwrap();

        let err = store.get("nope.bin").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::new(dir.path()).await.unwrap();

        for key in ["../outside.txt", "/etc/passwd", "a/../../b", ""] {
            let err = store.put(key, vec![1], "text/plain").await.unwrap_err();
            assert!(matches!(err, AppError::Storage(_)), "key {:?}", key);
        }
    }
}
