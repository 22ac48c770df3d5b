use std::sync::Arc;

use axum::{routing::get, Router};

use crate::features::admin::handlers;
use crate::features::admin::services::AdminService;

/// Create admin routes (mounted under `/admin/api` behind basic auth)
pub fn routes(admin_service: Arc<AdminService>) -> Router {
    Router::new()
        .route(
            "/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/posts/{id}",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route(
            "/posts/{id}/files",
            get(handlers::list_post_files).post(handlers::upload_post_file),
        )
        .route(
            "/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route(
            "/comments/{id}",
            get(handlers::get_comment)
                .put(handlers::update_comment)
                .delete(handlers::delete_comment),
        )
        .route(
            "/comments/{id}/files",
            get(handlers::list_comment_files).post(handlers::upload_comment_file),
        )
        .route("/files", get(handlers::list_files))
        .route(
            "/files/{id}",
            get(handlers::get_file)
                .put(handlers::update_file)
                .delete(handlers::delete_file),
        )
        .with_state(admin_service)
}
