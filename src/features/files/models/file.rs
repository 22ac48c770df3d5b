use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, Type};
use utoipa::ToSchema;

/// Kind of record a file can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    Post,
    Comment,
}

impl std::fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OwnerKind::Post => write!(f, "post"),
            OwnerKind::Comment => write!(f, "comment"),
        }
    }
}

/// Generic attachment pointer: which record a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct AttachmentOwner {
    pub kind: OwnerKind,
    pub id: i64,
}

impl AttachmentOwner {
    pub fn post(id: i64) -> Self {
        Self {
            kind: OwnerKind::Post,
            id,
        }
    }

    pub fn comment(id: i64) -> Self {
        Self {
            kind: OwnerKind::Comment,
            id,
        }
    }

    /// Check that the pointer resolves to an existing record of its kind
    pub async fn exists(&self, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
        let found: Option<i64> = match self.kind {
            OwnerKind::Post => {
                sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
                    .bind(self.id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            OwnerKind::Comment => {
                sqlx::query_scalar("SELECT id FROM comments WHERE id = ?")
                    .bind(self.id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
        };

        Ok(found.is_some())
    }
}

impl std::fmt::Display for AttachmentOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

/// Database model for files
#[derive(Debug, Clone, FromRow)]
pub struct File {
    pub id: i64,
    /// Display name
    pub name: String,
    /// Storage key of the payload in the blob store
    pub src: String,
    pub content_type: String,
    pub file_size: i64,
    pub owner_kind: OwnerKind,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

impl File {
    pub fn owner(&self) -> AttachmentOwner {
        AttachmentOwner {
            kind: self.owner_kind,
            id: self.owner_id,
        }
    }

    /// Last segment of the storage key, used as the download filename
    pub fn filename(&self) -> &str {
        self.src.rsplit('/').next().unwrap_or(&self.src)
    }

    pub fn download_url(&self) -> String {
        format!("/files/{}/download", self.id)
    }
}

/// Payload already written to the blob store, ready to be recorded
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub key: String,
    pub content_type: String,
    pub file_size: i64,
}
