use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::core::error::Result;
use crate::features::files::services::FileService;

/// Download the stored payload of a file
pub async fn download_file(
    State(service): State<Arc<FileService>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let (file, data) = service.download(id).await?;

    // filename() is the sanitized upload name, safe inside a quoted header value
    let disposition = format!("inline; filename=\"{}\"", file.filename());

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}

#[cfg(test)]
mod tests {
    use crate::features::files::models::AttachmentOwner;
    use crate::shared::test_helpers::TestContext;
    use axum::http::{header, StatusCode};

    #[tokio::test]
    async fn test_download_serves_payload() {
        let ctx = TestContext::new().await;
        let post = ctx.create_post("A", "text").await;
        let file = ctx
            .attach(AttachmentOwner::post(post.id), "notes", b"hello")
            .await;
        let server = ctx.server();

        let response = server.get(&file.download_url()).await;

        response.assert_status_ok();
        assert_eq!(response.header(header::CONTENT_TYPE), "text/plain");
        assert_eq!(
            response.header(header::CONTENT_DISPOSITION),
            "inline; filename=\"notes.txt\""
        );
        assert_eq!(response.as_bytes().to_vec(), b"hello".to_vec());
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let ctx = TestContext::new().await;
        let server = ctx.server();

        let response = server.get("/files/42/download").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
