use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::core::error::AppError;
use crate::features::files::models::{AttachmentOwner, File, OwnerKind};

/// Upload file request DTO for OpenAPI documentation
/// Note: This struct is for Swagger UI documentation only.
/// The actual handler uses the FormData extractor directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadFileDto {
    /// The file to upload
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub src: String,
    /// Display name (defaults to the uploaded filename)
    #[schema(example = "Quarterly report")]
    pub name: Option<String>,
}

/// Response DTO for file operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileResponseDto {
    pub id: i64,
    /// Display name
    pub name: String,
    /// MIME type of the stored payload
    pub content_type: String,
    /// Size of the payload in bytes
    pub file_size: i64,
    /// Record the file is attached to
    pub owner: AttachmentOwner,
    /// Download URL served by this application
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<File> for FileResponseDto {
    fn from(file: File) -> Self {
        Self {
            id: file.id,
            url: file.download_url(),
            owner: file.owner(),
            name: file.name,
            content_type: file.content_type,
            file_size: file.file_size,
            created_at: file.created_at,
        }
    }
}

/// Request DTO for renaming a file or moving it to another owner
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateFileDto {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,
    /// Must be given together with `owner_id`
    pub owner_kind: Option<OwnerKind>,
    /// Must be given together with `owner_kind`
    #[validate(range(min = 1, message = "owner_id must be positive"))]
    pub owner_id: Option<i64>,
}

impl UpdateFileDto {
    /// New attachment pointer, if one was requested
    pub fn owner(&self) -> Result<Option<AttachmentOwner>, AppError> {
        match (self.owner_kind, self.owner_id) {
            (Some(kind), Some(id)) => Ok(Some(AttachmentOwner { kind, id })),
            (None, None) => Ok(None),
            _ => Err(AppError::Validation(
                "owner_kind and owner_id must be given together".to_string(),
            )),
        }
    }
}

/// Query filter for listing files
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct FileListQuery {
    /// Only files attached to this kind of record
    pub owner_kind: Option<OwnerKind>,
    /// Only files attached to a record with this id
    pub owner_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_owner_requires_both_parts() {
        let dto = UpdateFileDto {
            name: None,
            owner_kind: Some(OwnerKind::Comment),
            owner_id: None,
        };
        assert!(dto.owner().is_err());

        let dto = UpdateFileDto {
            name: None,
            owner_kind: Some(OwnerKind::Comment),
            owner_id: Some(4),
        };
        assert_eq!(dto.owner().unwrap(), Some(AttachmentOwner::comment(4)));
    }

    #[test]
    fn test_update_name_bounds() {
        let dto = UpdateFileDto {
            name: Some(String::new()),
            owner_kind: None,
            owner_id: None,
        };
        assert!(dto.validate().is_err());

        let dto = UpdateFileDto {
            name: Some("ok".to_string()),
            owner_kind: None,
            owner_id: None,
        };
        assert!(dto.validate().is_ok());
    }
}
