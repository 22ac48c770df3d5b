use validator::Validate;

use crate::core::extractor::FormData;

/// Text fields of an inline file upload
#[derive(Debug, Clone, Validate)]
pub struct InlineUploadForm {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
}

impl InlineUploadForm {
    /// Read the upload name, falling back to the uploaded filename
    pub fn from_form(data: &FormData, filename: &str) -> Self {
        let name = data.trimmed("name");
        Self {
            name: if name.is_empty() {
                filename.trim().to_string()
            } else {
                name
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_falls_back_to_filename() {
        let data = FormData::default();
        let form = InlineUploadForm::from_form(&data, "report.pdf");
        assert_eq!(form.name, "report.pdf");

        let data = FormData::default().with_text("name", " Q3 report ");
        let form = InlineUploadForm::from_form(&data, "report.pdf");
        assert_eq!(form.name, "Q3 report");
    }

    #[test]
    fn test_name_length() {
        let form = InlineUploadForm {
            name: "x".repeat(256),
        };
        assert!(form.validate().is_err());

        let form = InlineUploadForm {
            name: String::new(),
        };
        assert!(form.validate().is_err());
    }
}
