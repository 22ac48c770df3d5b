use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use crate::core::error::{AppError, Result};
use crate::features::comments::models::Comment;
use crate::features::files::models::AttachmentOwner;
use crate::features::files::services::{delete_records_for_owner, FileService};

/// Service for comments on posts
pub struct CommentService {
    pool: SqlitePool,
    files: Arc<FileService>,
}

impl CommentService {
    pub fn new(pool: SqlitePool, files: Arc<FileService>) -> Self {
        Self { pool, files }
    }

    /// List comments, optionally only those on one post
    pub async fn list(&self, post_id: Option<i64>) -> Result<Vec<Comment>> {
        let comments = match post_id {
            Some(post_id) => {
                sqlx::query_as::<_, Comment>(
                    "SELECT id, text, post_id FROM comments WHERE post_id = ? ORDER BY id",
                )
                .bind(post_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Comment>("SELECT id, text, post_id FROM comments ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(comments)
    }

    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        self.list(Some(post_id)).await
    }

    pub async fn get(&self, id: i64) -> Result<Comment> {
        sqlx::query_as::<_, Comment>("SELECT id, text, post_id FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))
    }

    /// Create a comment on an existing post
    pub async fn create(&self, post_id: i64, text: &str) -> Result<Comment> {
        let mut tx = self.pool.begin().await?;

        if !AttachmentOwner::post(post_id).exists(&mut *tx).await? {
            return Err(AppError::Validation(format!(
                "Post {} does not exist",
                post_id
            )));
        }

        let comment = sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (text, post_id) VALUES (?, ?) RETURNING id, text, post_id",
        )
        .bind(text.trim())
        .bind(post_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Comment created: id={}, post_id={}", comment.id, comment.post_id);
        Ok(comment)
    }

    pub async fn update(&self, id: i64, text: &str) -> Result<Comment> {
        let comment = sqlx::query_as::<_, Comment>(
            "UPDATE comments SET text = ? WHERE id = ? RETURNING id, text, post_id",
        )
        .bind(text.trim())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", id)))?;

        info!("Comment updated: id={}", comment.id);
        Ok(comment)
    }

    /// Delete a comment together with the files attached to it
    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Comment {} not found", id)));
        }

        let keys = delete_records_for_owner(&mut *tx, AttachmentOwner::comment(id)).await?;
        tx.commit().await?;

        self.files.purge(&keys).await;

        info!("Comment deleted: id={}, files removed={}", id, keys.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::TestContext;

    #[tokio::test]
    async fn test_create_requires_existing_post() {
        let ctx = TestContext::new().await;

        let result = ctx.services.comments.create(99, "orphan").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(ctx.count("comments").await, 0);
    }

    #[tokio::test]
    async fn test_list_filters_by_post() {
        let ctx = TestContext::new().await;
        let a = ctx.create_post("A", "text").await;
        let b = ctx.create_post("B", "text").await;
        ctx.create_comment(a.id, "one").await;
        ctx.create_comment(b.id, "two").await;
        ctx.create_comment(a.id, "three").await;

        let on_a = ctx.services.comments.list_for_post(a.id).await.unwrap();
        assert_eq!(
            on_a.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["one", "three"]
        );
        assert_eq!(ctx.services.comments.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_text() {
        let ctx = TestContext::new().await;
        let post = ctx.create_post("A", "text").await;
        let comment = ctx.create_comment(post.id, "typo").await;

        let updated = ctx.services.comments.update(comment.id, " fixed ").await.unwrap();
        assert_eq!(updated.text, "fixed");

        let missing = ctx.services.comments.update(999, "x").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_attached_files() {
        let ctx = TestContext::new().await;
        let post = ctx.create_post("A", "text").await;
        let comment = ctx.create_comment(post.id, "with file").await;
        let file = ctx
            .attach(AttachmentOwner::comment(comment.id), "att", b"data")
            .await;
        ctx.attach(AttachmentOwner::post(post.id), "post file", b"data")
            .await;

        ctx.services.comments.delete(comment.id).await.unwrap();

        assert_eq!(ctx.count("comments").await, 0);
        assert_eq!(ctx.count("files").await, 1);
        assert!(!ctx.payload_exists(&file.src).await);
    }
}
