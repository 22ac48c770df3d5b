use std::collections::HashMap;
use std::sync::Arc;

use crate::core::error::Result;
use crate::core::extractor::UploadedFile;
use crate::features::comments::dtos::{
    CommentDetailDto, CommentResponseDto, CreateCommentDto, UpdateCommentDto,
};
use crate::features::comments::services::CommentService;
use crate::features::files::dtos::{FileListQuery, FileResponseDto, UpdateFileDto};
use crate::features::files::models::{AttachmentOwner, File, OwnerKind};
use crate::features::files::services::FileService;
use crate::features::posts::dtos::{PostDetailDto, PostInput, PostResponseDto};
use crate::features::posts::services::PostService;

/// Record management across posts, comments and files
pub struct AdminService {
    posts: Arc<PostService>,
    comments: Arc<CommentService>,
    files: Arc<FileService>,
}

impl AdminService {
    pub fn new(
        posts: Arc<PostService>,
        comments: Arc<CommentService>,
        files: Arc<FileService>,
    ) -> Self {
        Self {
            posts,
            comments,
            files,
        }
    }

    // =========================================================================
    // POSTS
    // =========================================================================

    pub async fn list_posts(&self) -> Result<Vec<PostResponseDto>> {
        let posts = self.posts.list().await?;
        Ok(posts.into_iter().map(PostResponseDto::from).collect())
    }

    /// Post with its files, its comments, and the comments' files
    pub async fn get_post(&self, id: i64) -> Result<PostDetailDto> {
        let post = self.posts.get(id).await?;
        let files = self.files.list_for_owner(AttachmentOwner::post(id)).await?;

        let mut comment_files: HashMap<i64, Vec<File>> = HashMap::new();
        for file in self.files.list_for_post_comments(id).await? {
            comment_files.entry(file.owner_id).or_default().push(file);
        }

        let comments = self
            .comments
            .list_for_post(id)
            .await?
            .into_iter()
            .map(|comment| {
                let files = comment_files.remove(&comment.id).unwrap_or_default();
                CommentDetailDto {
                    comment: comment.into(),
                    files: into_dtos(files),
                }
            })
            .collect();

        Ok(PostDetailDto {
            post: post.into(),
            files: into_dtos(files),
            comments,
        })
    }

    pub async fn create_post(&self, input: &PostInput) -> Result<PostResponseDto> {
        let post = self.posts.create(input).await?;
        Ok(post.into())
    }

    pub async fn update_post(&self, id: i64, input: &PostInput) -> Result<PostResponseDto> {
        let post = self.posts.update(id, input).await?;
        Ok(post.into())
    }

    pub async fn delete_post(&self, id: i64) -> Result<()> {
        self.posts.delete(id).await
    }

    // =========================================================================
    // COMMENTS
    // =========================================================================

    pub async fn list_comments(&self, post_id: Option<i64>) -> Result<Vec<CommentResponseDto>> {
        let comments = self.comments.list(post_id).await?;
        Ok(comments.into_iter().map(CommentResponseDto::from).collect())
    }

    pub async fn get_comment(&self, id: i64) -> Result<CommentDetailDto> {
        let comment = self.comments.get(id).await?;
        let files = self
            .files
            .list_for_owner(AttachmentOwner::comment(id))
            .await?;

        Ok(CommentDetailDto {
            comment: comment.into(),
            files: into_dtos(files),
        })
    }

    pub async fn create_comment(&self, dto: &CreateCommentDto) -> Result<CommentResponseDto> {
        let comment = self.comments.create(dto.post_id, &dto.text).await?;
        Ok(comment.into())
    }

    pub async fn update_comment(
        &self,
        id: i64,
        dto: &UpdateCommentDto,
    ) -> Result<CommentResponseDto> {
        let comment = self.comments.update(id, &dto.text).await?;
        Ok(comment.into())
    }

    pub async fn delete_comment(&self, id: i64) -> Result<()> {
        self.comments.delete(id).await
    }

    // =========================================================================
    // FILES
    // =========================================================================

    pub async fn list_files(&self, query: &FileListQuery) -> Result<Vec<FileResponseDto>> {
        let files = self.files.list(query.owner_kind, query.owner_id).await?;
        Ok(into_dtos(files))
    }

    pub async fn get_file(&self, id: i64) -> Result<FileResponseDto> {
        let file = self.files.get(id).await?;
        Ok(file.into())
    }

    pub async fn update_file(&self, id: i64, dto: &UpdateFileDto) -> Result<FileResponseDto> {
        let owner = dto.owner()?;
        let file = self.files.update(id, dto.name.as_deref(), owner).await?;
        Ok(file.into())
    }

    pub async fn delete_file(&self, id: i64) -> Result<()> {
        self.files.delete(id).await
    }

    /// Files attached to one post or comment; 404 when the owner is missing
    pub async fn list_owner_files(&self, owner: AttachmentOwner) -> Result<Vec<FileResponseDto>> {
        self.ensure_owner(owner).await?;
        let files = self.files.list_for_owner(owner).await?;
        Ok(into_dtos(files))
    }

    /// Attach an uploaded payload to one post or comment
    pub async fn upload_owner_file(
        &self,
        owner: AttachmentOwner,
        name: &str,
        upload: UploadedFile,
    ) -> Result<FileResponseDto> {
        self.ensure_owner(owner).await?;
        let file = self.files.upload(owner, name, upload).await?;
        Ok(file.into())
    }

    async fn ensure_owner(&self, owner: AttachmentOwner) -> Result<()> {
        match owner.kind {
            OwnerKind::Post => self.posts.get(owner.id).await.map(|_| ()),
            OwnerKind::Comment => self.comments.get(owner.id).await.map(|_| ()),
        }
    }
}

fn into_dtos(files: Vec<File>) -> Vec<FileResponseDto> {
    files.into_iter().map(FileResponseDto::from).collect()
}
