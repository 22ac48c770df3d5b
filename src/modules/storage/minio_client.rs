//! MinIO/S3-compatible storage backend
//!
//! Uses rust-s3 crate for lightweight S3 operations. Objects are written
//! under a configurable prefix so the bucket can be shared.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::{debug, info, warn};

use super::BlobStore;
use crate::core::config::MinIOConfig;
use crate::core::error::AppError;

/// MinIO/S3-compatible storage client
pub struct MinIOClient {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
    prefix: String,
}

impl MinIOClient {
    /// Create a new MinIO client from configuration and make sure the bucket exists
    pub async fn new(config: MinIOConfig) -> Result<Self, AppError> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Storage(format!("Failed to create MinIO bucket: {}", e)))?;

        // Use path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        let client = Self {
            bucket,
            region,
            credentials,
            endpoint: config.endpoint,
            prefix: config.prefix.trim_matches('/').to_string(),
        };

        client.ensure_bucket_exists().await?;

        info!(
            "MinIO client initialized for endpoint: {}, bucket: {}, prefix: {}",
            client.endpoint,
            client.bucket.name(),
            client.prefix
        );

        Ok(client)
    }

    /// Ensure the bucket exists, create if not
    pub async fn ensure_bucket_exists(&self) -> Result<(), AppError> {
        let result = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match result {
            Ok(_) => {
                info!("Bucket '{}' created successfully", self.bucket.name());
                Ok(())
            }
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
                Ok(())
            }
        }
    }

    /// Object key inside the bucket for a storage key
    fn object_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }
}

#[async_trait]
impl BlobStore for MinIOClient {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        let object_key = self.object_key(key);
        let response = self
            .bucket
            .put_object_with_content_type(&object_key, &data, content_type)
            .await
            .map_err(|e| {
                AppError::Storage(format!("Failed to upload file '{}': {}", object_key, e))
            })?;

        if !(200..300).contains(&response.status_code()) {
            return Err(AppError::Storage(format!(
                "Upload of '{}' returned status {}",
                object_key,
                response.status_code()
            )));
        }

        debug!("Uploaded '{}' to bucket '{}'", object_key, self.bucket.name());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        let object_key = self.object_key(key);
        let response = self.bucket.get_object(&object_key).await.map_err(|e| {
            AppError::Storage(format!("Failed to download file '{}': {}", object_key, e))
        })?;

        match response.status_code() {
            200..=299 => Ok(response.to_vec()),
            404 => Err(AppError::NotFound(format!(
                "Stored file '{}' not found",
                key
            ))),
            status => Err(AppError::Storage(format!(
                "Download of '{}' returned status {}",
                object_key, status
            ))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let object_key = self.object_key(key);
        self.bucket.delete_object(&object_key).await.map_err(|e| {
            AppError::Storage(format!("Failed to delete file '{}': {}", object_key, e))
        })?;

        debug!(
            "Deleted '{}' from bucket '{}'",
            object_key,
            self.bucket.name()
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let object_key = self.object_key(key);
        match self.bucket.head_object(&object_key).await {
            Ok((_, status)) => Ok((200..300).contains(&status)),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("404") || error_str.contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(AppError::Storage(format!(
                        "Failed to check if file '{}' exists: {}",
                        object_key, e
                    )))
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "minio"
    }
}
