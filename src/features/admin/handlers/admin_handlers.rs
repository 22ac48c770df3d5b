use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::core::extractor::{AppJson, FormData};
use crate::features::admin::dtos::InlineUploadForm;
use crate::features::admin::services::AdminService;
use crate::features::comments::dtos::{
    CommentDetailDto, CommentListQuery, CommentResponseDto, CreateCommentDto, UpdateCommentDto,
};
use crate::features::files::dtos::{FileListQuery, FileResponseDto, UpdateFileDto, UploadFileDto};
use crate::features::files::models::AttachmentOwner;
use crate::features::posts::dtos::{PostDetailDto, PostInput, PostResponseDto};
use crate::shared::types::{ApiResponse, Meta};

type Created<T> = (StatusCode, Json<ApiResponse<T>>);

fn list_response<T>(items: Vec<T>) -> Json<ApiResponse<Vec<T>>> {
    let total = items.len() as i64;
    Json(ApiResponse::success(Some(items), None, Some(Meta { total })))
}

// =============================================================================
// POSTS
// =============================================================================

/// List all posts
#[utoipa::path(
    get,
    path = "/admin/api/posts",
    responses(
        (status = 200, description = "List of posts", body = ApiResponse<Vec<PostResponseDto>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn list_posts(
    State(service): State<Arc<AdminService>>,
) -> Result<Json<ApiResponse<Vec<PostResponseDto>>>> {
    let posts = service.list_posts().await?;
    Ok(list_response(posts))
}

/// Get a post with its files and comments
#[utoipa::path(
    get,
    path = "/admin/api/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post found", body = ApiResponse<PostDetailDto>),
        (status = 404, description = "Post not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn get_post(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<PostDetailDto>>> {
    let post = service.get_post(id).await?;
    Ok(Json(ApiResponse::success(Some(post), None, None)))
}

/// Create a post
#[utoipa::path(
    post,
    path = "/admin/api/posts",
    request_body = PostInput,
    responses(
        (status = 201, description = "Post created", body = ApiResponse<PostResponseDto>),
        (status = 400, description = "Validation error")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn create_post(
    State(service): State<Arc<AdminService>>,
    AppJson(dto): AppJson<PostInput>,
) -> Result<Created<PostResponseDto>> {
    dto.validate()?;

    let post = service.create_post(&dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(post),
            Some("Post created".to_string()),
            None,
        )),
    ))
}

/// Update a post's fields
#[utoipa::path(
    put,
    path = "/admin/api/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = PostInput,
    responses(
        (status = 200, description = "Post updated", body = ApiResponse<PostResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Post not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn update_post(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
    AppJson(dto): AppJson<PostInput>,
) -> Result<Json<ApiResponse<PostResponseDto>>> {
    dto.validate()?;

    let post = service.update_post(id, &dto).await?;
    Ok(Json(ApiResponse::success(Some(post), None, None)))
}

/// Delete a post, its comments, and all their files
#[utoipa::path(
    delete,
    path = "/admin/api/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post deleted"),
        (status = 404, description = "Post not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn delete_post(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete_post(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Post deleted".to_string()),
        None,
    )))
}

// =============================================================================
// COMMENTS
// =============================================================================

/// List comments, optionally for one post
#[utoipa::path(
    get,
    path = "/admin/api/comments",
    params(CommentListQuery),
    responses(
        (status = 200, description = "List of comments", body = ApiResponse<Vec<CommentResponseDto>>)
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn list_comments(
    State(service): State<Arc<AdminService>>,
    Query(query): Query<CommentListQuery>,
) -> Result<Json<ApiResponse<Vec<CommentResponseDto>>>> {
    let comments = service.list_comments(query.post_id).await?;
    Ok(list_response(comments))
}

/// Get a comment with its files
#[utoipa::path(
    get,
    path = "/admin/api/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment found", body = ApiResponse<CommentDetailDto>),
        (status = 404, description = "Comment not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn get_comment(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CommentDetailDto>>> {
    let comment = service.get_comment(id).await?;
    Ok(Json(ApiResponse::success(Some(comment), None, None)))
}

/// Create a comment on an existing post
#[utoipa::path(
    post,
    path = "/admin/api/comments",
    request_body = CreateCommentDto,
    responses(
        (status = 201, description = "Comment created", body = ApiResponse<CommentResponseDto>),
        (status = 400, description = "Validation error or unknown post")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn create_comment(
    State(service): State<Arc<AdminService>>,
    AppJson(dto): AppJson<CreateCommentDto>,
) -> Result<Created<CommentResponseDto>> {
    dto.validate()?;

    let comment = service.create_comment(&dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(comment),
            Some("Comment created".to_string()),
            None,
        )),
    ))
}

/// Edit a comment's text
#[utoipa::path(
    put,
    path = "/admin/api/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    request_body = UpdateCommentDto,
    responses(
        (status = 200, description = "Comment updated", body = ApiResponse<CommentResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Comment not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn update_comment(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
    AppJson(dto): AppJson<UpdateCommentDto>,
) -> Result<Json<ApiResponse<CommentResponseDto>>> {
    dto.validate()?;

    let comment = service.update_comment(id, &dto).await?;
    Ok(Json(ApiResponse::success(Some(comment), None, None)))
}

/// Delete a comment and its files
#[utoipa::path(
    delete,
    path = "/admin/api/comments/{id}",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment deleted"),
        (status = 404, description = "Comment not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn delete_comment(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete_comment(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("Comment deleted".to_string()),
        None,
    )))
}

// =============================================================================
// FILES
// =============================================================================

/// List files, optionally filtered by owner
#[utoipa::path(
    get,
    path = "/admin/api/files",
    params(FileListQuery),
    responses(
        (status = 200, description = "List of files", body = ApiResponse<Vec<FileResponseDto>>)
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn list_files(
    State(service): State<Arc<AdminService>>,
    Query(query): Query<FileListQuery>,
) -> Result<Json<ApiResponse<Vec<FileResponseDto>>>> {
    let files = service.list_files(&query).await?;
    Ok(list_response(files))
}

/// Get a file record
#[utoipa::path(
    get,
    path = "/admin/api/files/{id}",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "File found", body = ApiResponse<FileResponseDto>),
        (status = 404, description = "File not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn get_file(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<FileResponseDto>>> {
    let file = service.get_file(id).await?;
    Ok(Json(ApiResponse::success(Some(file), None, None)))
}

/// Rename a file or attach it to another record
#[utoipa::path(
    put,
    path = "/admin/api/files/{id}",
    params(("id" = i64, Path, description = "File ID")),
    request_body = UpdateFileDto,
    responses(
        (status = 200, description = "File updated", body = ApiResponse<FileResponseDto>),
        (status = 400, description = "Validation error or unknown owner"),
        (status = 404, description = "File not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn update_file(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
    AppJson(dto): AppJson<UpdateFileDto>,
) -> Result<Json<ApiResponse<FileResponseDto>>> {
    dto.validate()?;

    let file = service.update_file(id, &dto).await?;
    Ok(Json(ApiResponse::success(Some(file), None, None)))
}

/// Delete a file record and its payload
#[utoipa::path(
    delete,
    path = "/admin/api/files/{id}",
    params(("id" = i64, Path, description = "File ID")),
    responses(
        (status = 200, description = "File deleted"),
        (status = 404, description = "File not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn delete_file(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>> {
    service.delete_file(id).await?;
    Ok(Json(ApiResponse::success(
        None,
        Some("File deleted".to_string()),
        None,
    )))
}

// =============================================================================
// INLINE FILES
// =============================================================================

/// List the files attached to a post
#[utoipa::path(
    get,
    path = "/admin/api/posts/{id}/files",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Files of the post", body = ApiResponse<Vec<FileResponseDto>>),
        (status = 404, description = "Post not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn list_post_files(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<FileResponseDto>>>> {
    let files = service.list_owner_files(AttachmentOwner::post(id)).await?;
    Ok(list_response(files))
}

/// Upload a file attached to a post
#[utoipa::path(
    post,
    path = "/admin/api/posts/{id}/files",
    params(("id" = i64, Path, description = "Post ID")),
    request_body(content = UploadFileDto, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File attached", body = ApiResponse<FileResponseDto>),
        (status = 400, description = "Missing or invalid upload"),
        (status = 404, description = "Post not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn upload_post_file(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
    data: FormData,
) -> Result<Created<FileResponseDto>> {
    upload_owner_file(&service, AttachmentOwner::post(id), data).await
}

/// List the files attached to a comment
#[utoipa::path(
    get,
    path = "/admin/api/comments/{id}/files",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Files of the comment", body = ApiResponse<Vec<FileResponseDto>>),
        (status = 404, description = "Comment not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn list_comment_files(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<FileResponseDto>>>> {
    let files = service
        .list_owner_files(AttachmentOwner::comment(id))
        .await?;
    Ok(list_response(files))
}

/// Upload a file attached to a comment
#[utoipa::path(
    post,
    path = "/admin/api/comments/{id}/files",
    params(("id" = i64, Path, description = "Comment ID")),
    request_body(content = UploadFileDto, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File attached", body = ApiResponse<FileResponseDto>),
        (status = 400, description = "Missing or invalid upload"),
        (status = 404, description = "Comment not found")
    ),
    tag = "admin",
    security(("basic_auth" = []))
)]
pub async fn upload_comment_file(
    State(service): State<Arc<AdminService>>,
    Path(id): Path<i64>,
    data: FormData,
) -> Result<Created<FileResponseDto>> {
    upload_owner_file(&service, AttachmentOwner::comment(id), data).await
}

async fn upload_owner_file(
    service: &AdminService,
    owner: AttachmentOwner,
    mut data: FormData,
) -> Result<Created<FileResponseDto>> {
    let upload = data
        .take_file("src")
        .ok_or_else(|| AppError::BadRequest("No file provided in field 'src'".to_string()))?;

    let form = InlineUploadForm::from_form(&data, &upload.filename);
    form.validate()?;

    let file = service.upload_owner_file(owner, &form.name, upload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(file),
            Some("File uploaded successfully".to_string()),
            None,
        )),
    ))
}
