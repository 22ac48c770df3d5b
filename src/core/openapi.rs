use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::admin::handlers as admin_handlers;
use crate::features::comments::dtos as comments_dtos;
use crate::features::files::{dtos as files_dtos, models as files_models};
use crate::features::posts::dtos as posts_dtos;
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Posts
        admin_handlers::list_posts,
        admin_handlers::get_post,
        admin_handlers::create_post,
        admin_handlers::update_post,
        admin_handlers::delete_post,
        admin_handlers::list_post_files,
        admin_handlers::upload_post_file,
        // Comments
        admin_handlers::list_comments,
        admin_handlers::get_comment,
        admin_handlers::create_comment,
        admin_handlers::update_comment,
        admin_handlers::delete_comment,
        admin_handlers::list_comment_files,
        admin_handlers::upload_comment_file,
        // Files
        admin_handlers::list_files,
        admin_handlers::get_file,
        admin_handlers::update_file,
        admin_handlers::delete_file,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Posts
            posts_dtos::PostInput,
            posts_dtos::PostResponseDto,
            posts_dtos::PostDetailDto,
            ApiResponse<posts_dtos::PostResponseDto>,
            ApiResponse<posts_dtos::PostDetailDto>,
            // Comments
            comments_dtos::CreateCommentDto,
            comments_dtos::UpdateCommentDto,
            comments_dtos::CommentResponseDto,
            comments_dtos::CommentDetailDto,
            ApiResponse<comments_dtos::CommentResponseDto>,
            ApiResponse<comments_dtos::CommentDetailDto>,
            // Files
            files_models::OwnerKind,
            files_models::AttachmentOwner,
            files_dtos::UploadFileDto,
            files_dtos::UpdateFileDto,
            files_dtos::FileResponseDto,
            ApiResponse<files_dtos::FileResponseDto>,
        )
    ),
    tags(
        (name = "admin", description = "Record management for posts, comments and files"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Posthaste Admin API",
        version = "0.1.0",
        description = "Record management for posts, comments and files",
    )
)]
pub struct ApiDoc;

/// Adds the HTTP basic security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_paths_documented() {
        let doc = ApiDoc::openapi();

        assert!(doc.paths.paths.contains_key("/admin/api/posts/{id}"));
        assert!(doc.paths.paths.contains_key("/admin/api/comments/{id}/files"));
        assert!(doc.paths.paths.contains_key("/admin/api/files"));
    }

    #[test]
    fn test_info_modifier() {
        let mut doc = ApiDoc::openapi();
        SwaggerInfoModifier {
            title: "Custom".to_string(),
            version: "9.9.9".to_string(),
            description: "desc".to_string(),
        }
        .modify(&mut doc);

        assert_eq!(doc.info.title, "Custom");
        assert_eq!(doc.info.version, "9.9.9");
    }
}
