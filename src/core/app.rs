//! Service wiring and the HTTP router.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit, http::StatusCode, middleware::from_fn, routing::get, Router,
};
use sqlx::SqlitePool;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::core::config::Config;
use crate::core::middleware;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::features::admin::{self, AdminService};
use crate::features::comments::CommentService;
use crate::features::files::{self, FileService};
use crate::features::posts::{self, PostPagesState, PostService};
use crate::modules::storage::BlobStore;

/// Shared services, one instance per process
#[derive(Clone)]
pub struct AppServices {
    pub files: Arc<FileService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub admin: Arc<AdminService>,
}

impl AppServices {
    pub fn new(pool: SqlitePool, store: Arc<dyn BlobStore>, max_upload_size: usize) -> Self {
        let files = Arc::new(FileService::new(pool.clone(), store, max_upload_size));
        let posts = Arc::new(PostService::new(pool.clone(), Arc::clone(&files)));
        let comments = Arc::new(CommentService::new(pool, Arc::clone(&files)));
        let admin = Arc::new(AdminService::new(
            Arc::clone(&posts),
            Arc::clone(&comments),
            Arc::clone(&files),
        ));

        Self {
            files,
            posts,
            comments,
            admin,
        }
    }
}

/// Simple health check endpoint (no auth required)
async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Build the application router.
///
/// The admin API and Swagger UI are mounted only when admin credentials are
/// configured, and always behind basic auth.
pub fn build_router(services: &AppServices, config: &Config) -> Router {
    let body_limit = DefaultBodyLimit::max(config.app.max_request_body_size);

    let pages = posts::routes(PostPagesState {
        posts: Arc::clone(&services.posts),
        comments: Arc::clone(&services.comments),
        files: Arc::clone(&services.files),
    })
    .layer(body_limit);

    let mut app = Router::new()
        .merge(pages)
        .merge(files::routes(Arc::clone(&services.files)))
        .route("/health", get(health_check));

    if let Some(credentials) = config.admin.credentials() {
        let swagger_modifier = SwaggerInfoModifier {
            title: config.swagger.title.clone(),
            version: config.swagger.version.clone(),
            description: config.swagger.description.clone(),
        };
        let mut openapi = ApiDoc::openapi();
        swagger_modifier.modify(&mut openapi);

        let protected = Router::new()
            .nest(
                "/admin/api",
                admin::routes(Arc::clone(&services.admin)).layer(body_limit),
            )
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn(middleware::basic_auth_middleware(Arc::new(
                credentials,
            ))));

        tracing::info!("Admin API and Swagger UI enabled (basic auth)");
        app = app.merge(protected);
    } else {
        tracing::info!("Admin API and Swagger UI disabled (no credentials configured)");
    }

    app.layer(middleware::cors_layer(
        config.app.cors_allowed_origins.clone(),
    ))
    // Propagate X-Request-Id to response headers
    .layer(PropagateRequestIdLayer::x_request_id())
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(middleware::MakeSpanWithRequestId)
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
    // Generate X-Request-Id using UUID v7 (or use client-provided one)
    .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid))
}
