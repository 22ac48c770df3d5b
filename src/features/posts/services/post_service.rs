use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::error::{AppError, Result};
use crate::features::files::formset::FileChange;
use crate::features::files::models::{AttachmentOwner, File, OwnerKind};
use crate::features::files::services::{
    delete_records_for_post, ensure_owner_exists, staged_keys, FileService, StagedChange,
};
use crate::features::posts::dtos::PostInput;
use crate::features::posts::models::Post;

/// File changes for one owner, as validated from a formset
pub type OwnerChanges = (AttachmentOwner, Vec<FileChange>);

/// Service for posts and the files submitted with them
pub struct PostService {
    pool: SqlitePool,
    files: Arc<FileService>,
}

impl PostService {
    pub fn new(pool: SqlitePool, files: Arc<FileService>) -> Self {
        Self { pool, files }
    }

    /// All posts in storage order
    pub async fn list(&self) -> Result<Vec<Post>> {
        let posts =
            sqlx::query_as::<_, Post>("SELECT id, title, text, date FROM posts ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(posts)
    }

    /// All posts, each with the files attached to it
    pub async fn list_with_files(&self) -> Result<Vec<(Post, Vec<File>)>> {
        let posts = self.list().await?;

        let mut files_by_post: HashMap<i64, Vec<File>> = HashMap::new();
        for file in self.files.list(Some(OwnerKind::Post), None).await? {
            files_by_post.entry(file.owner_id).or_default().push(file);
        }

        Ok(posts
            .into_iter()
            .map(|post| {
                let files = files_by_post.remove(&post.id).unwrap_or_default();
                (post, files)
            })
            .collect())
    }

    pub async fn get(&self, id: i64) -> Result<Post> {
        sqlx::query_as::<_, Post>("SELECT id, title, text, date FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))
    }

    pub async fn create(&self, input: &PostInput) -> Result<Post> {
        self.create_with_files(input, Vec::new()).await
    }

    /// Create a post and attach the submitted files to it.
    ///
    /// Payloads are written first; the post and file records are then
    /// inserted in one transaction.
    pub async fn create_with_files(
        &self,
        input: &PostInput,
        changes: Vec<FileChange>,
    ) -> Result<Post> {
        let staged = self.files.stage(changes).await?;
        let new_keys = staged_keys(&staged);

        match self.insert_with_files(input, &staged).await {
            Ok(post) => {
                info!(
                    "Post created: id={}, files attached={}",
                    post.id,
                    new_keys.len()
                );
                Ok(post)
            }
            Err(e) => {
                self.files.purge(&new_keys).await;
                Err(e)
            }
        }
    }

    async fn insert_with_files(&self, input: &PostInput, staged: &[StagedChange]) -> Result<Post> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(
            "INSERT INTO posts (title, text, date) VALUES (?, ?, ?) RETURNING id, title, text, date",
        )
        .bind(&input.title)
        .bind(&input.text)
        .bind(input.date.unwrap_or_else(Utc::now))
        .fetch_one(&mut *tx)
        .await?;

        self.files
            .apply_staged(&mut *tx, AttachmentOwner::post(post.id), staged)
            .await?;

        tx.commit().await?;
        Ok(post)
    }

    pub async fn update(&self, id: i64, input: &PostInput) -> Result<Post> {
        self.update_with_files(id, input, Vec::new()).await
    }

    /// Update a post and apply file changes for the post and its comments.
    ///
    /// Replaced and removed payloads are deleted only after the records
    /// are committed.
    pub async fn update_with_files(
        &self,
        id: i64,
        input: &PostInput,
        changes: Vec<OwnerChanges>,
    ) -> Result<Post> {
        let mut staged: Vec<(AttachmentOwner, Vec<StagedChange>)> = Vec::new();
        for (owner, owner_changes) in changes {
            match self.files.stage(owner_changes).await {
                Ok(s) => staged.push((owner, s)),
                Err(e) => {
                    for (_, s) in &staged {
                        self.files.purge(&staged_keys(s)).await;
                    }
                    return Err(e);
                }
            }
        }
        let new_keys: Vec<String> = staged.iter().flat_map(|(_, s)| staged_keys(s)).collect();

        match self.write_update(id, input, &staged).await {
            Ok((post, stale_keys)) => {
                self.files.purge(&stale_keys).await;
                info!(
                    "Post updated: id={}, payloads stored={}, payloads removed={}",
                    post.id,
                    new_keys.len(),
                    stale_keys.len()
                );
                Ok(post)
            }
            Err(e) => {
                self.files.purge(&new_keys).await;
                Err(e)
            }
        }
    }

    async fn write_update(
        &self,
        id: i64,
        input: &PostInput,
        staged: &[(AttachmentOwner, Vec<StagedChange>)],
    ) -> Result<(Post, Vec<String>)> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(
            "UPDATE posts SET title = ?, text = ?, date = COALESCE(?, date) WHERE id = ? \
             RETURNING id, title, text, date",
        )
        .bind(&input.title)
        .bind(&input.text)
        .bind(input.date)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;

        let mut stale_keys = Vec::new();
        for (owner, changes) in staged {
            ensure_belongs_to_post(&mut *tx, *owner, id).await?;
            let stale = self.files.apply_staged(&mut *tx, *owner, changes).await?;
            debug!("Applied {} file changes to {}", changes.len(), owner);
            stale_keys.extend(stale);
        }

        tx.commit().await?;
        Ok((post, stale_keys))
    }

    /// Delete a post, its comments, and every file attached to either
    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // Files first: the comment rows are still needed to find comment files
        let keys = delete_records_for_post(&mut *tx, id).await?;

        let deleted = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Post {} not found", id)));
        }

        tx.commit().await?;
        self.files.purge(&keys).await;

        info!("Post deleted: id={}, files removed={}", id, keys.len());
        Ok(())
    }
}

/// File changes submitted with a post may only target the post or its comments
async fn ensure_belongs_to_post(
    conn: &mut SqliteConnection,
    owner: AttachmentOwner,
    post_id: i64,
) -> Result<()> {
    match owner.kind {
        OwnerKind::Post if owner.id == post_id => Ok(()),
        OwnerKind::Post => Err(AppError::Validation(format!(
            "Cannot change files of post {} from post {}",
            owner.id, post_id
        ))),
        OwnerKind::Comment => {
            ensure_owner_exists(&mut *conn, owner).await?;
            let parent: i64 = sqlx::query_scalar("SELECT post_id FROM comments WHERE id = ?")
                .bind(owner.id)
                .fetch_one(&mut *conn)
                .await?;
            if parent == post_id {
                Ok(())
            } else {
                Err(AppError::Validation(format!(
                    "Comment {} does not belong to post {}",
                    owner.id, post_id
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::test_helpers::{text_upload, TestContext};
    use fake::faker::lorem::en::{Paragraph, Sentence};
    use fake::Fake;

    fn input(title: &str) -> PostInput {
        PostInput {
            title: title.to_string(),
            text: Paragraph(1..3).fake(),
            date: None,
        }
    }

    #[tokio::test]
    async fn test_create_with_files_attaches_to_new_post() {
        let ctx = TestContext::new().await;
        let title: String = Sentence(2..5).fake();

        let post = ctx
            .services
            .posts
            .create_with_files(
                &input(&title),
                vec![FileChange::Create {
                    name: "Notes".to_string(),
                    upload: text_upload("notes.txt", b"hello"),
                }],
            )
            .await
            .unwrap();

        assert_eq!(post.title, title);
        let files = ctx
            .services
            .files
            .list_for_owner(AttachmentOwner::post(post.id))
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "Notes");
        assert!(ctx.payload_exists(&files[0].src).await);
    }

    #[tokio::test]
    async fn test_update_keeps_date_and_files() {
        let ctx = TestContext::new().await;
        let post = ctx.create_post("Before", "text").await;
        let file = ctx.attach(AttachmentOwner::post(post.id), "a", b"aaa").await;

        let updated = ctx.services.posts.update(post.id, &input("After")).await.unwrap();

        assert_eq!(updated.title, "After");
        assert_eq!(updated.date, post.date);
        assert_eq!(ctx.services.files.get(file.id).await.unwrap().name, "a");
    }

    #[tokio::test]
    async fn test_update_missing_post_is_not_found() {
        let ctx = TestContext::new().await;

        let result = ctx.services.posts.update(404, &input("Nope")).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_replacing_payload_removes_old_one() {
        let ctx = TestContext::new().await;
        let post = ctx.create_post("Post", "text").await;
        let file = ctx.attach(AttachmentOwner::post(post.id), "a", b"old").await;

        ctx.services
            .posts
            .update_with_files(
                post.id,
                &input("Post"),
                vec![(
                    AttachmentOwner::post(post.id),
                    vec![FileChange::Update {
                        id: file.id,
                        name: "renamed".to_string(),
                        upload: Some(text_upload("new.txt", b"new")),
                    }],
                )],
            )
            .await
            .unwrap();

        let (updated, data) = ctx.services.files.download(file.id).await.unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(data, b"new");
        assert!(!ctx.payload_exists(&file.src).await);
    }

    #[tokio::test]
    async fn test_comment_files_of_other_post_are_rejected() {
        let ctx = TestContext::new().await;
        let post = ctx.create_post("Mine", "text").await;
        let other = ctx.create_post("Other", "text").await;
        let comment = ctx.create_comment(other.id, "not yours").await;

        let result = ctx
            .services
            .posts
            .update_with_files(
                post.id,
                &input("Mine"),
                vec![(
                    AttachmentOwner::comment(comment.id),
                    vec![FileChange::Create {
                        name: "sneaky".to_string(),
                        upload: text_upload("sneaky.txt", b"x"),
                    }],
                )],
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(ctx.count("files").await, 0);
        // The post update was rolled back with the file changes
        assert_eq!(ctx.services.posts.get(post.id).await.unwrap().title, "Mine");
    }

    #[tokio::test]
    async fn test_delete_cascades_to_comments_and_files() {
        let ctx = TestContext::new().await;
        let post = ctx.create_post("Doomed", "text").await;
        let keep = ctx.create_post("Kept", "text").await;
        let comment = ctx.create_comment(post.id, "bye").await;
        let post_file = ctx.attach(AttachmentOwner::post(post.id), "p", b"p").await;
        let comment_file = ctx
            .attach(AttachmentOwner::comment(comment.id), "c", b"c")
            .await;
        let kept_file = ctx.attach(AttachmentOwner::post(keep.id), "k", b"k").await;

        ctx.services.posts.delete(post.id).await.unwrap();

        assert_eq!(ctx.count("posts").await, 1);
        assert_eq!(ctx.count("comments").await, 0);
        assert_eq!(ctx.count("files").await, 1);
        assert!(!ctx.payload_exists(&post_file.src).await);
        assert!(!ctx.payload_exists(&comment_file.src).await);
        assert!(ctx.payload_exists(&kept_file.src).await);

        let again = ctx.services.posts.delete(post.id).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }
}
