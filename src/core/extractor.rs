use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::error::AppError;
use crate::shared::constants::DEFAULT_CONTENT_TYPE;

/// Custom JSON extractor that provides consistent error responses
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppJsonRejection;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(value) => Ok(Self(value.0)),
            Err(rejection) => Err(AppJsonRejection(rejection)),
        }
    }
}

pub struct AppJsonRejection(JsonRejection);

impl IntoResponse for AppJsonRejection {
    fn into_response(self) -> Response {
        let message = match self.0 {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON data: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("Invalid JSON syntax: {}", err),
            JsonRejection::MissingJsonContentType(err) => {
                format!("Missing JSON content type: {}", err)
            }
            _ => "Failed to parse JSON body".to_string(),
        };

        AppError::BadRequest(message).into_response()
    }
}

/// A file part received in a form submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Submitted HTML form: text fields plus file parts, keyed by field name.
///
/// Accepts `multipart/form-data` and `application/x-www-form-urlencoded`.
/// When a name repeats, the last value wins.
#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl FormData {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Text value with surrounding whitespace removed, empty when absent
    pub fn trimmed(&self, name: &str) -> String {
        self.text(name).map(str::trim).unwrap_or_default().to_string()
    }

    /// Checkbox semantics: present and not an explicit "off" value
    pub fn flag(&self, name: &str) -> bool {
        match self.text(name) {
            Some(v) => !matches!(v.trim().to_lowercase().as_str(), "" | "false" | "off" | "0"),
            None => false,
        }
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: UploadedFile) -> Self {
        self.files.insert(name.into(), file);
        self
    }
}

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;

            let mut form = FormData::default();
            form.fields.extend(pairs);
            return Ok(form);
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let mut form = FormData::default();
        while let Some(field) = multipart.next_field().await.map_err(|e| {
            debug!("Failed to read multipart field: {}", e);
            AppError::BadRequest(format!("Failed to read multipart data: {}", e))
        })? {
            let name = match field.name() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => continue,
            };

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field
                        .content_type()
                        .filter(|ct| !ct.is_empty())
                        .unwrap_or(DEFAULT_CONTENT_TYPE)
                        .to_string();
                    let data = field.bytes().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read file data: {}", e))
                    })?;

                    // Browsers send an empty, unnamed part for an untouched file input
                    if filename.is_empty() && data.is_empty() {
                        continue;
                    }

                    form.files.insert(
                        name,
                        UploadedFile {
                            filename,
                            content_type,
                            data: data.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        AppError::BadRequest(format!("Failed to read field '{}': {}", name, e))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_semantics() {
        let form = FormData::default()
            .with_text("a", "on")
            .with_text("b", "off")
            .with_text("c", "")
            .with_text("d", "true");

        assert!(form.flag("a"));
        assert!(!form.flag("b"));
        assert!(!form.flag("c"));
        assert!(form.flag("d"));
        assert!(!form.flag("missing"));
    }

    #[test]
    fn test_trimmed_and_take_file() {
        let upload = UploadedFile {
            filename: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            data: b"abc".to_vec(),
        };
        let mut form = FormData::default()
            .with_text("title", "  Hello  ")
            .with_file("files-0-src", upload.clone());

        assert_eq!(form.trimmed("title"), "Hello");
        assert_eq!(form.trimmed("missing"), "");
        assert_eq!(form.take_file("files-0-src"), Some(upload));
        assert_eq!(form.take_file("files-0-src"), None);
    }
}
