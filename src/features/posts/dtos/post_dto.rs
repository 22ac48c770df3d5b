use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::core::extractor::FormData;
use crate::features::comments::dtos::CommentDetailDto;
use crate::features::files::dtos::FileResponseDto;
use crate::features::posts::models::Post;
use crate::shared::validation::validate_required;

/// Post fields accepted from the HTML form and the admin API
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct PostInput {
    #[validate(
        custom(function = "validate_required"),
        length(max = 200, message = "Ensure this value has at most 200 characters.")
    )]
    pub title: String,
    #[validate(custom(function = "validate_required"))]
    pub text: String,
    /// Publication date; defaults to now on creation and is kept on update
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl PostInput {
    /// Read the post fields of a submitted HTML form
    pub fn from_form(data: &FormData) -> Self {
        Self {
            title: data.trimmed("title"),
            text: data.trimmed("text"),
            date: None,
        }
    }
}

/// Response DTO for post
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostResponseDto {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub date: DateTime<Utc>,
}

impl From<Post> for PostResponseDto {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            title: p.title,
            text: p.text,
            date: p.date,
        }
    }
}

/// Post with its attached files and its comments
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostDetailDto {
    #[serde(flatten)]
    pub post: PostResponseDto,
    pub files: Vec<FileResponseDto>,
    pub comments: Vec<CommentDetailDto>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::validation::{field_messages, REQUIRED_MESSAGE};

    #[test]
    fn test_from_form_trims_fields() {
        let data = FormData::default()
            .with_text("title", "  Hello ")
            .with_text("text", "\nBody\n");
        let input = PostInput::from_form(&data);

        assert_eq!(input.title, "Hello");
        assert_eq!(input.text, "Body");
        assert!(input.date.is_none());
    }

    #[test]
    fn test_validation_messages() {
        let input = PostInput {
            title: String::new(),
            text: "body".to_string(),
            date: None,
        };
        let errors = field_messages(&input.validate().unwrap_err());
        assert_eq!(errors["title"], vec![REQUIRED_MESSAGE.to_string()]);
        assert!(!errors.contains_key("text"));

        let input = PostInput {
            title: "t".repeat(201),
            text: String::new(),
            date: None,
        };
        let errors = field_messages(&input.validate().unwrap_err());
        assert_eq!(
            errors["title"],
            vec!["Ensure this value has at most 200 characters.".to_string()]
        );
        assert_eq!(errors["text"], vec![REQUIRED_MESSAGE.to_string()]);

        let input = PostInput {
            title: "t".repeat(200),
            text: "ok".to_string(),
            date: None,
        };
        assert!(input.validate().is_ok());
    }
}
