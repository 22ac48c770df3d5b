use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::extractor::UploadedFile;
use crate::features::files::formset::FileChange;
use crate::features::files::models::{AttachmentOwner, File, OwnerKind, StoredBlob};
use crate::modules::storage::BlobStore;
use crate::shared::validation::sanitize_filename;

const FILE_COLUMNS: &str =
    "id, name, src, content_type, file_size, owner_kind, owner_id, created_at";

/// A formset change whose payload (if any) is already in the blob store
#[derive(Debug)]
pub enum StagedChange {
    Create {
        name: String,
        blob: StoredBlob,
    },
    Update {
        id: i64,
        name: String,
        blob: Option<StoredBlob>,
    },
    Delete {
        id: i64,
    },
}

impl StagedChange {
    fn new_key(&self) -> Option<&str> {
        match self {
            StagedChange::Create { blob, .. } => Some(&blob.key),
            StagedChange::Update { blob: Some(blob), .. } => Some(&blob.key),
            _ => None,
        }
    }
}

/// Storage keys written while staging, for cleanup when the write fails
pub fn staged_keys(staged: &[StagedChange]) -> Vec<String> {
    staged
        .iter()
        .filter_map(StagedChange::new_key)
        .map(str::to_string)
        .collect()
}

/// Service for files and their generic attachment to posts and comments
pub struct FileService {
    pool: SqlitePool,
    store: Arc<dyn BlobStore>,
    max_upload_size: usize,
}

impl FileService {
    pub fn new(pool: SqlitePool, store: Arc<dyn BlobStore>, max_upload_size: usize) -> Self {
        Self {
            pool,
            store,
            max_upload_size,
        }
    }

    pub fn max_upload_size(&self) -> usize {
        self.max_upload_size
    }

    pub async fn get(&self, id: i64) -> Result<File> {
        let sql = format!("SELECT {} FROM files WHERE id = ?", FILE_COLUMNS);
        sqlx::query_as::<_, File>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    /// All files, optionally narrowed to one owner kind and/or owner id
    pub async fn list(&self, kind: Option<OwnerKind>, owner_id: Option<i64>) -> Result<Vec<File>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM files WHERE 1 = 1", FILE_COLUMNS));
        if let Some(kind) = kind {
            query.push(" AND owner_kind = ").push_bind(kind);
        }
        if let Some(owner_id) = owner_id {
            query.push(" AND owner_id = ").push_bind(owner_id);
        }
        query.push(" ORDER BY id");

        let files = query.build_query_as::<File>().fetch_all(&self.pool).await?;
        Ok(files)
    }

    pub async fn list_for_owner(&self, owner: AttachmentOwner) -> Result<Vec<File>> {
        self.list(Some(owner.kind), Some(owner.id)).await
    }

    /// Files attached to any comment of the given post
    pub async fn list_for_post_comments(&self, post_id: i64) -> Result<Vec<File>> {
        let sql = format!(
            "SELECT {} FROM files WHERE owner_kind = 'comment' \
             AND owner_id IN (SELECT id FROM comments WHERE post_id = ?) ORDER BY id",
            FILE_COLUMNS
        );
        let files = sqlx::query_as::<_, File>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    /// Attach a single uploaded payload to an owner
    pub async fn upload(
        &self,
        owner: AttachmentOwner,
        name: &str,
        upload: UploadedFile,
    ) -> Result<File> {
        self.check_upload(&upload)?;

        let mut conn = self.pool.acquire().await?;
        ensure_owner_exists(&mut *conn, owner).await?;

        let blob = self.store_upload(upload).await?;
        match insert_record(&mut *conn, owner, name, &blob).await {
            Ok(file) => {
                info!(
                    "File saved: id={}, key={}, owner={}, size={}",
                    file.id, file.src, owner, file.file_size
                );
                Ok(file)
            }
            Err(e) => {
                self.purge(&[blob.key]).await;
                Err(e)
            }
        }
    }

    /// Rename a file and/or point it at another owner
    pub async fn update(
        &self,
        id: i64,
        name: Option<&str>,
        owner: Option<AttachmentOwner>,
    ) -> Result<File> {
        let mut tx = self.pool.begin().await?;

        let current = fetch_record(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;

        let owner = owner.unwrap_or_else(|| current.owner());
        ensure_owner_exists(&mut *tx, owner).await?;

        let sql = format!(
            "UPDATE files SET name = ?, owner_kind = ?, owner_id = ? WHERE id = ? RETURNING {}",
            FILE_COLUMNS
        );
        let file = sqlx::query_as::<_, File>(&sql)
            .bind(name.unwrap_or(current.name.as_str()))
            .bind(owner.kind)
            .bind(owner.id)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("File updated: id={}, owner={}", file.id, owner);
        Ok(file)
    }

    /// Delete a file record and its stored payload
    pub async fn delete(&self, id: i64) -> Result<()> {
        let sql = format!("DELETE FROM files WHERE id = ? RETURNING {}", FILE_COLUMNS);
        let file = sqlx::query_as::<_, File>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))?;

        self.purge(&[file.src.clone()]).await;

        info!("File deleted: id={}, key={}", file.id, file.src);
        Ok(())
    }

    /// Load a file record together with its payload
    pub async fn download(&self, id: i64) -> Result<(File, Vec<u8>)> {
        let file = self.get(id).await?;
        let data = self.store.get(&file.src).await?;
        Ok((file, data))
    }

    /// Write the payloads of validated formset changes to the blob store.
    ///
    /// On failure, payloads already written by this call are removed again.
    pub async fn stage(&self, changes: Vec<FileChange>) -> Result<Vec<StagedChange>> {
        let mut staged = Vec::with_capacity(changes.len());

        for change in changes {
            let result = match change {
                FileChange::Create { name, upload } => self
                    .store_upload(upload)
                    .await
                    .map(|blob| StagedChange::Create { name, blob }),
                FileChange::Update { id, name, upload } => match upload {
                    Some(upload) => self.store_upload(upload).await.map(|blob| {
                        StagedChange::Update {
                            id,
                            name,
                            blob: Some(blob),
                        }
                    }),
                    None => Ok(StagedChange::Update {
                        id,
                        name,
                        blob: None,
                    }),
                },
                FileChange::Delete { id } => Ok(StagedChange::Delete { id }),
            };

            match result {
                Ok(change) => staged.push(change),
                Err(e) => {
                    self.purge(&staged_keys(&staged)).await;
                    return Err(e);
                }
            }
        }

        Ok(staged)
    }

    /// Record staged changes for `owner` on an open connection or transaction.
    ///
    /// Returns the storage keys that are no longer referenced once the
    /// surrounding transaction commits.
    pub async fn apply_staged(
        &self,
        conn: &mut SqliteConnection,
        owner: AttachmentOwner,
        staged: &[StagedChange],
    ) -> Result<Vec<String>> {
        let mut stale = Vec::new();

        for change in staged {
            match change {
                StagedChange::Create { name, blob } => {
                    let file = insert_record(&mut *conn, owner, name, blob).await?;
                    debug!("Attached file {} to {}", file.id, owner);
                }
                StagedChange::Update { id, name, blob } => {
                    let current = fetch_owned_record(&mut *conn, *id, owner).await?;
                    match blob {
                        Some(blob) => {
                            sqlx::query(
                                "UPDATE files SET name = ?, src = ?, content_type = ?, file_size = ? \
                                 WHERE id = ?",
                            )
                            .bind(name)
                            .bind(&blob.key)
                            .bind(&blob.content_type)
                            .bind(blob.file_size)
                            .bind(id)
                            .execute(&mut *conn)
                            .await?;
                            stale.push(current.src);
                        }
                        None => {
                            sqlx::query("UPDATE files SET name = ? WHERE id = ?")
                                .bind(name)
                                .bind(id)
                                .execute(&mut *conn)
                                .await?;
                        }
                    }
                }
                StagedChange::Delete { id } => {
                    let current = fetch_owned_record(&mut *conn, *id, owner).await?;
                    sqlx::query("DELETE FROM files WHERE id = ?")
                        .bind(id)
                        .execute(&mut *conn)
                        .await?;
                    stale.push(current.src);
                }
            }
        }

        Ok(stale)
    }

    /// Best-effort removal of payloads; failures are logged, not returned
    pub async fn purge(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.store.delete(key).await {
                warn!("Failed to remove stored payload '{}': {}", key, e);
            }
        }
    }

    fn check_upload(&self, upload: &UploadedFile) -> Result<()> {
        if upload.data.is_empty() {
            return Err(AppError::Validation("The submitted file is empty.".to_string()));
        }
        if upload.data.len() > self.max_upload_size {
            return Err(AppError::Validation(format!(
                "File too large. Maximum size is {} bytes ({} MB)",
                self.max_upload_size,
                self.max_upload_size / 1024 / 1024
            )));
        }
        Ok(())
    }

    async fn store_upload(&self, upload: UploadedFile) -> Result<StoredBlob> {
        // Build key: uploads/{uuid}/{sanitized original filename}
        let key = format!(
            "uploads/{}/{}",
            Uuid::new_v4().simple(),
            sanitize_filename(&upload.filename)
        );
        let file_size = upload.data.len() as i64;

        self.store
            .put(&key, upload.data, &upload.content_type)
            .await?;

        debug!("Payload stored in {} backend: {}", self.store.name(), key);

        Ok(StoredBlob {
            key,
            content_type: upload.content_type,
            file_size,
        })
    }
}

/// Reject attachment pointers that do not resolve to a record
pub async fn ensure_owner_exists(conn: &mut SqliteConnection, owner: AttachmentOwner) -> Result<()> {
    if owner.exists(conn).await? {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Cannot attach file: {} does not exist",
            owner
        )))
    }
}

/// Delete the file records attached to `owner`, returning their storage keys
pub async fn delete_records_for_owner(
    conn: &mut SqliteConnection,
    owner: AttachmentOwner,
) -> Result<Vec<String>> {
    let keys: Vec<String> =
        sqlx::query_scalar("DELETE FROM files WHERE owner_kind = ? AND owner_id = ? RETURNING src")
            .bind(owner.kind)
            .bind(owner.id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(keys)
}

/// Delete the file records attached to a post or to any of its comments
pub async fn delete_records_for_post(
    conn: &mut SqliteConnection,
    post_id: i64,
) -> Result<Vec<String>> {
    let mut keys = delete_records_for_owner(&mut *conn, AttachmentOwner::post(post_id)).await?;

    let comment_keys: Vec<String> = sqlx::query_scalar(
        "DELETE FROM files WHERE owner_kind = 'comment' \
         AND owner_id IN (SELECT id FROM comments WHERE post_id = ?) RETURNING src",
    )
    .bind(post_id)
    .fetch_all(&mut *conn)
    .await?;

    keys.extend(comment_keys);
    Ok(keys)
}

async fn fetch_record(conn: &mut SqliteConnection, id: i64) -> Result<Option<File>> {
    let sql = format!("SELECT {} FROM files WHERE id = ?", FILE_COLUMNS);
    let file = sqlx::query_as::<_, File>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(file)
}

async fn fetch_owned_record(
    conn: &mut SqliteConnection,
    id: i64,
    owner: AttachmentOwner,
) -> Result<File> {
    fetch_record(conn, id)
        .await?
        .filter(|file| file.owner() == owner)
        .ok_or_else(|| AppError::NotFound(format!("File {} is not attached to {}", id, owner)))
}

async fn insert_record(
    conn: &mut SqliteConnection,
    owner: AttachmentOwner,
    name: &str,
    blob: &StoredBlob,
) -> Result<File> {
    let sql = format!(
        "INSERT INTO files (name, src, content_type, file_size, owner_kind, owner_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {}",
        FILE_COLUMNS
    );
    let file = sqlx::query_as::<_, File>(&sql)
        .bind(name)
        .bind(&blob.key)
        .bind(&blob.content_type)
        .bind(blob.file_size)
        .bind(owner.kind)
        .bind(owner.id)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;
    Ok(file)
}
