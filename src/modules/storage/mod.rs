//! Storage module for uploaded payloads
//!
//! Files keep only a storage key in the database; the bytes live in a
//! [`BlobStore`]. Two backends are provided: a local directory and a
//! MinIO/S3-compatible bucket.

mod local;
mod minio_client;

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::config::{StorageBackend, StorageConfig};
use crate::core::error::AppError;

pub use local::LocalStorage;
pub use minio_client::MinIOClient;

/// Blob store holding uploaded file payloads, addressed by key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing anything already there
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    /// Read the payload stored under `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError>;

    /// Remove the payload under `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    async fn exists(&self, key: &str) -> Result<bool, AppError>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

/// Build the configured blob store
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn BlobStore>, AppError> {
    match config.backend {
        StorageBackend::Local => {
            let store = LocalStorage::new(&config.media_root).await?;
            Ok(Arc::new(store))
        }
        StorageBackend::MinIO => {
            let store = MinIOClient::new(config.minio.clone()).await?;
            Ok(Arc::new(store))
        }
    }
}
