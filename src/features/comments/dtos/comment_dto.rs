use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::features::comments::models::Comment;
use crate::features::files::dtos::FileResponseDto;
use crate::shared::validation::validate_required;

/// Request DTO for creating a comment
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCommentDto {
    #[validate(custom(function = "validate_required"))]
    pub text: String,
    /// Post the comment belongs to
    #[validate(range(min = 1, message = "post_id must be positive"))]
    pub post_id: i64,
}

/// Request DTO for editing a comment
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCommentDto {
    #[validate(custom(function = "validate_required"))]
    pub text: String,
}

/// Response DTO for comment
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentResponseDto {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
}

impl From<Comment> for CommentResponseDto {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            text: c.text,
            post_id: c.post_id,
        }
    }
}

/// Comment with the files attached to it
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentDetailDto {
    #[serde(flatten)]
    pub comment: CommentResponseDto,
    pub files: Vec<FileResponseDto>,
}

/// Query filter for listing comments
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CommentListQuery {
    /// Only comments on this post
    pub post_id: Option<i64>,
}
