//! Fixtures shared by the unit and HTTP tests.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum_test::TestServer;
use base64::prelude::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::core::app::{build_router, AppServices};
use crate::core::config::{
    AdminConfig, AppConfig, Config, DatabaseConfig, MinIOConfig, StorageBackend, StorageConfig,
    SwaggerConfig,
};
use crate::core::database;
use crate::core::extractor::UploadedFile;
use crate::features::comments::models::Comment;
use crate::features::files::models::{AttachmentOwner, File};
use crate::features::posts::dtos::PostInput;
use crate::features::posts::models::Post;
use crate::modules::storage::{BlobStore, LocalStorage};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "secret";
pub const TEST_UPLOAD_LIMIT: usize = 64 * 1024;

/// In-memory database with the schema applied.
///
/// A single connection that never expires, so every query sees the same
/// in-memory database.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();

    database::run_migrations(&pool).await.unwrap();
    pool
}

pub fn text_upload(filename: &str, body: &[u8]) -> UploadedFile {
    UploadedFile {
        filename: filename.to_string(),
        content_type: "text/plain".to_string(),
        data: body.to_vec(),
    }
}

pub fn admin_auth_header() -> HeaderValue {
    let encoded = BASE64_STANDARD.encode(format!("{}:{}", ADMIN_USERNAME, ADMIN_PASSWORD));
    HeaderValue::from_str(&format!("Basic {}", encoded)).unwrap()
}

/// Services over an in-memory database and a temporary media root
pub struct TestContext {
    pub pool: SqlitePool,
    pub store: Arc<LocalStorage>,
    pub services: AppServices,
    media: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        let pool = test_pool().await;
        let media = TempDir::new().unwrap();
        let store = Arc::new(LocalStorage::new(media.path()).await.unwrap());
        let blob_store: Arc<dyn BlobStore> = store.clone();
        let services = AppServices::new(pool.clone(), blob_store, TEST_UPLOAD_LIMIT);

        Self {
            pool,
            store,
            services,
            media,
        }
    }

    pub fn config(&self, admin_enabled: bool) -> Config {
        let admin = if admin_enabled {
            AdminConfig {
                username: Some(ADMIN_USERNAME.to_string()),
                password: Some(ADMIN_PASSWORD.to_string()),
            }
        } else {
            AdminConfig::default()
        };

        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_allowed_origins: vec!["*".to_string()],
                max_upload_size: TEST_UPLOAD_LIMIT,
                max_request_body_size: TEST_UPLOAD_LIMIT * 8,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                min_connections: 1,
                acquire_timeout_secs: 5,
                idle_timeout_secs: 600,
                max_lifetime_secs: 1800,
            },
            storage: StorageConfig {
                backend: StorageBackend::Local,
                media_root: PathBuf::from(self.media.path()),
                minio: MinIOConfig {
                    endpoint: "http://localhost:9000".to_string(),
                    access_key: "minioadmin".to_string(),
                    secret_key: "minioadmin".to_string(),
                    bucket: "posthaste-test".to_string(),
                    region: "us-east-1".to_string(),
                    prefix: "media".to_string(),
                },
            },
            admin,
            swagger: SwaggerConfig {
                title: "Posthaste Admin API".to_string(),
                version: "0.1.0".to_string(),
                description: "test".to_string(),
            },
        }
    }

    /// HTTP test server with the admin surface enabled
    pub fn server(&self) -> TestServer {
        TestServer::new(build_router(&self.services, &self.config(true))).unwrap()
    }

    pub fn server_without_admin(&self) -> TestServer {
        TestServer::new(build_router(&self.services, &self.config(false))).unwrap()
    }

    pub async fn create_post(&self, title: &str, text: &str) -> Post {
        let input = PostInput {
            title: title.to_string(),
            text: text.to_string(),
            date: None,
        };
        self.services.posts.create(&input).await.unwrap()
    }

    pub async fn create_comment(&self, post_id: i64, text: &str) -> Comment {
        self.services.comments.create(post_id, text).await.unwrap()
    }

    pub async fn attach(&self, owner: AttachmentOwner, name: &str, body: &[u8]) -> File {
        self.services
            .files
            .upload(owner, name, text_upload(&format!("{}.txt", name), body))
            .await
            .unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn payload_exists(&self, key: &str) -> bool {
        self.store.exists(key).await.unwrap()
    }
}
