//! File formsets: a batch of file sub-forms submitted with a parent form.
//!
//! Field naming for a formset with prefix `files`:
//!
//! | field                 | meaning                                    |
//! |-----------------------|--------------------------------------------|
//! | `files-TOTAL_FORMS`   | number of sub-forms in the submission      |
//! | `files-{i}-id`        | id of an existing file (blank for new)     |
//! | `files-{i}-name`      | display name                               |
//! | `files-{i}-src`       | uploaded payload                           |
//! | `files-{i}-DELETE`    | checkbox, removes an existing file         |
//!
//! Completely blank new forms are ignored, so rendered pages can always
//! carry a few spare rows.

use serde::Serialize;
use std::collections::HashSet;
use validator::Validate;

use crate::core::extractor::{FormData, UploadedFile};
use crate::features::files::models::File;
use crate::shared::constants::{FILE_FORMSET_EXTRA, FILE_FORMSET_MAX_FORMS};
use crate::shared::validation::{field_messages, validate_required, FieldErrors, REQUIRED_MESSAGE};

/// Formset prefix for the files of one comment
pub fn comment_files_prefix(comment_id: i64) -> String {
    format!("comment-{}-files", comment_id)
}

/// One requested modification of the files attached to an owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Create {
        name: String,
        upload: UploadedFile,
    },
    Update {
        id: i64,
        name: String,
        upload: Option<UploadedFile>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Validate)]
struct FileNameForm {
    #[validate(
        custom(function = "validate_required"),
        length(max = 255, message = "Ensure this value has at most 255 characters.")
    )]
    name: String,
}

/// Link to an already stored payload, shown next to existing rows
#[derive(Debug, Clone, Serialize)]
pub struct FileLink {
    pub id: i64,
    pub name: String,
    pub filename: String,
    pub url: String,
}

impl From<&File> for FileLink {
    fn from(file: &File) -> Self {
        Self {
            id: file.id,
            name: file.name.clone(),
            filename: file.filename().to_string(),
            url: file.download_url(),
        }
    }
}

/// Render state of a single sub-form
#[derive(Debug, Clone, Serialize)]
pub struct FileFormView {
    pub index: usize,
    pub id: Option<i64>,
    pub name: String,
    pub current: Option<FileLink>,
    pub delete: bool,
    pub errors: FieldErrors,
}

impl FileFormView {
    fn blank(index: usize) -> Self {
        Self {
            index,
            id: None,
            name: String::new(),
            current: None,
            delete: false,
            errors: FieldErrors::new(),
        }
    }
}

/// A file formset, either blank (for display) or bound to a submission
#[derive(Debug, Serialize)]
pub struct FileFormset {
    pub prefix: String,
    pub forms: Vec<FileFormView>,
    pub non_form_errors: Vec<String>,
    #[serde(skip)]
    changes: Vec<FileChange>,
}

impl FileFormset {
    /// Formset listing `existing` files followed by blank rows
    pub fn unbound(prefix: &str, existing: &[File]) -> Self {
        let mut forms: Vec<FileFormView> = existing
            .iter()
            .enumerate()
            .map(|(index, file)| FileFormView {
                index,
                id: Some(file.id),
                name: file.name.clone(),
                current: Some(FileLink::from(file)),
                delete: false,
                errors: FieldErrors::new(),
            })
            .collect();

        let start = forms.len();
        forms.extend((start..start + FILE_FORMSET_EXTRA).map(FileFormView::blank));

        Self {
            prefix: prefix.to_string(),
            forms,
            non_form_errors: Vec::new(),
            changes: Vec::new(),
        }
    }

    /// Reject the whole submission, keeping spare rows so uploads stay possible
    fn rejected(mut self, message: String) -> Self {
        self.non_form_errors.push(message);
        self.forms = (0..FILE_FORMSET_EXTRA).map(FileFormView::blank).collect();
        self
    }

    /// Bind the submitted sub-forms for `prefix`.
    ///
    /// `existing` are the files currently attached to the formset's owner;
    /// ids outside that set are rejected.
    pub fn bind(
        prefix: &str,
        data: &mut FormData,
        existing: &[File],
        max_upload_size: usize,
    ) -> Self {
        let mut formset = Self {
            prefix: prefix.to_string(),
            forms: Vec::new(),
            non_form_errors: Vec::new(),
            changes: Vec::new(),
        };

        let total_key = format!("{}-TOTAL_FORMS", prefix);
        let total = match data.text(&total_key).map(|v| v.trim().parse::<usize>()) {
            Some(Ok(n)) if n <= FILE_FORMSET_MAX_FORMS => n,
            Some(Ok(_)) => {
                return formset.rejected(format!(
                    "Please submit at most {} forms.",
                    FILE_FORMSET_MAX_FORMS
                ));
            }
            _ => {
                return formset.rejected(
                    "ManagementForm data is missing or has been tampered with.".to_string(),
                );
            }
        };

        let mut seen_ids = HashSet::new();
        for index in 0..total {
            let field = |name: &str| format!("{}-{}-{}", prefix, index, name);

            let raw_id = data.trimmed(&field("id"));
            let name = data.trimmed(&field("name"));
            let delete = data.flag(&field("DELETE"));
            let upload = data.take_file(&field("src"));

            let mut view = FileFormView {
                index,
                id: None,
                name: name.clone(),
                current: None,
                delete,
                errors: FieldErrors::new(),
            };

            let existing_file = if raw_id.is_empty() {
                None
            } else {
                let found = raw_id
                    .parse::<i64>()
                    .ok()
                    .and_then(|id| existing.iter().find(|f| f.id == id));
                match found {
                    Some(file) if !seen_ids.insert(file.id) => {
                        view.id = Some(file.id);
                        view.current = Some(FileLink::from(file));
                        view.errors.insert(
                            "id".to_string(),
                            vec!["Please correct the duplicate data for id.".to_string()],
                        );
                        formset.forms.push(view);
                        continue;
                    }
                    Some(file) => Some(file),
                    None => {
                        view.errors.insert(
                            "id".to_string(),
                            vec!["Select a valid choice. That file is not attached here."
                                .to_string()],
                        );
                        formset.forms.push(view);
                        continue;
                    }
                }
            };

            match existing_file {
                Some(file) => {
                    view.id = Some(file.id);
                    view.current = Some(FileLink::from(file));

                    if delete {
                        formset.changes.push(FileChange::Delete { id: file.id });
                        formset.forms.push(view);
                        continue;
                    }

                    validate_name(&name, &mut view.errors);
                    if let Some(upload) = &upload {
                        validate_upload(upload, max_upload_size, &mut view.errors);
                    }

                    if view.errors.is_empty() {
                        formset.changes.push(FileChange::Update {
                            id: file.id,
                            name,
                            upload,
                        });
                    }
                }
                None => {
                    // Blank or discarded spare rows carry no change
                    if delete || (name.is_empty() && upload.is_none()) {
                        formset.forms.push(view);
                        continue;
                    }

                    validate_name(&name, &mut view.errors);
                    match &upload {
                        Some(upload) => validate_upload(upload, max_upload_size, &mut view.errors),
                        None => {
                            view.errors
                                .insert("src".to_string(), vec![REQUIRED_MESSAGE.to_string()]);
                        }
                    }

                    if view.errors.is_empty() {
                        if let Some(upload) = upload {
                            formset.changes.push(FileChange::Create { name, upload });
                        }
                    }
                }
            }

            formset.forms.push(view);
        }

        formset
    }

    pub fn is_valid(&self) -> bool {
        self.non_form_errors.is_empty() && self.forms.iter().all(|f| f.errors.is_empty())
    }

    /// Validated changes, in submission order
    pub fn into_changes(self) -> Vec<FileChange> {
        self.changes
    }

    pub fn total_forms(&self) -> usize {
        self.forms.len()
    }
}

fn validate_name(name: &str, errors: &mut FieldErrors) {
    let form = FileNameForm {
        name: name.to_string(),
    };
    if let Err(e) = form.validate() {
        errors.extend(field_messages(&e));
    }
}

fn validate_upload(upload: &UploadedFile, max_upload_size: usize, errors: &mut FieldErrors) {
    let message = if upload.data.is_empty() {
        "The submitted file is empty.".to_string()
    } else if upload.data.len() > max_upload_size {
        format!(
            "File too large. Maximum size is {} bytes ({} MB)",
            max_upload_size,
            max_upload_size / 1024 / 1024
        )
    } else {
        return;
    };

    errors.entry("src".to_string()).or_default().push(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::files::models::OwnerKind;
    use chrono::Utc;

    const LIMIT: usize = 1024;

    fn upload(name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            content_type: "text/plain".to_string(),
            data: bytes.to_vec(),
        }
    }

    fn stored(id: i64) -> File {
        File {
            id,
            name: format!("file {}", id),
            src: format!("uploads/abc/file{}.txt", id),
            content_type: "text/plain".to_string(),
            file_size: 3,
            owner_kind: OwnerKind::Post,
            owner_id: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_unbound_appends_blank_rows() {
        let formset = FileFormset::unbound("files", &[stored(7)]);

        assert_eq!(formset.total_forms(), 1 + FILE_FORMSET_EXTRA);
        assert_eq!(formset.forms[0].id, Some(7));
        assert_eq!(formset.forms[0].current.as_ref().unwrap().filename, "file7.txt");
        assert!(formset.forms[1..].iter().all(|f| f.id.is_none()));
    }

    #[test]
    fn test_missing_management_form_is_invalid() {
        let mut data = FormData::default();
        let formset = FileFormset::bind("files", &mut data, &[], LIMIT);

        assert!(!formset.is_valid());
        assert_eq!(formset.non_form_errors.len(), 1);
        assert_eq!(formset.total_forms(), FILE_FORMSET_EXTRA);
        assert!(formset.forms.iter().all(|f| f.id.is_none() && f.errors.is_empty()));
    }

    #[test]
    fn test_too_many_forms_is_invalid() {
        let mut data = FormData::default().with_text("files-TOTAL_FORMS", "1001");
        let formset = FileFormset::bind("files", &mut data, &[], LIMIT);

        assert!(!formset.is_valid());
        assert_eq!(formset.total_forms(), FILE_FORMSET_EXTRA);
    }

    #[test]
    fn test_blank_rows_are_ignored() {
        let mut data = FormData::default()
            .with_text("files-TOTAL_FORMS", "3")
            .with_text("files-0-name", "")
            .with_text("files-1-name", "   ");
        let formset = FileFormset::bind("files", &mut data, &[], LIMIT);

        assert!(formset.is_valid());
        assert!(formset.into_changes().is_empty());
    }

    #[test]
    fn test_new_row_creates_file() {
        let mut data = FormData::default()
            .with_text("files-TOTAL_FORMS", "1")
            .with_text("files-0-name", "Notes")
            .with_file("files-0-src", upload("notes.txt", b"abc"));
        let formset = FileFormset::bind("files", &mut data, &[], LIMIT);

        assert!(formset.is_valid());
        assert_eq!(
            formset.into_changes(),
            vec![FileChange::Create {
                name: "Notes".to_string(),
                upload: upload("notes.txt", b"abc"),
            }]
        );
    }

    #[test]
    fn test_new_row_requires_name_and_payload() {
        let mut data = FormData::default()
            .with_text("files-TOTAL_FORMS", "2")
            .with_text("files-0-name", "Only a name")
            .with_file("files-1-src", upload("x.txt", b"x"));
        let formset = FileFormset::bind("files", &mut data, &[], LIMIT);

        assert!(!formset.is_valid());
        assert_eq!(formset.forms[0].errors["src"], vec![REQUIRED_MESSAGE.to_string()]);
        assert_eq!(formset.forms[1].errors["name"], vec![REQUIRED_MESSAGE.to_string()]);
        assert_eq!(formset.forms[0].name, "Only a name");
    }

    #[test]
    fn test_upload_limits() {
        let big = vec![0u8; LIMIT + 1];
        let mut data = FormData::default()
            .with_text("files-TOTAL_FORMS", "2")
            .with_text("files-0-name", "big")
            .with_file("files-0-src", upload("big.bin", &big))
            .with_text("files-1-name", "empty")
            .with_file("files-1-src", upload("empty.bin", b""));
        let formset = FileFormset::bind("files", &mut data, &[], LIMIT);

        assert!(!formset.is_valid());
        assert!(formset.forms[0].errors["src"][0].starts_with("File too large"));
        assert_eq!(formset.forms[1].errors["src"][0], "The submitted file is empty.");
    }

    #[test]
    fn test_name_too_long() {
        let mut data = FormData::default()
            .with_text("files-TOTAL_FORMS", "1")
            .with_text("files-0-name", "n".repeat(256))
            .with_file("files-0-src", upload("a.txt", b"a"));
        let formset = FileFormset::bind("files", &mut data, &[], LIMIT);

        assert!(!formset.is_valid());
        assert!(formset.forms[0].errors.contains_key("name"));
    }

    #[test]
    fn test_existing_rows_update_and_delete() {
        let existing = [stored(1), stored(2)];
        let mut data = FormData::default()
            .with_text("files-TOTAL_FORMS", "2")
            .with_text("files-0-id", "1")
            .with_text("files-0-name", "Renamed")
            .with_text("files-1-id", "2")
            .with_text("files-1-name", "")
            .with_text("files-1-DELETE", "on");
        let formset = FileFormset::bind("files", &mut data, &existing, LIMIT);

        assert!(formset.is_valid());
        assert_eq!(
            formset.into_changes(),
            vec![
                FileChange::Update {
                    id: 1,
                    name: "Renamed".to_string(),
                    upload: None,
                },
                FileChange::Delete { id: 2 },
            ]
        );
    }

    #[test]
    fn test_foreign_id_is_rejected() {
        let mut data = FormData::default()
            .with_text("files-TOTAL_FORMS", "1")
            .with_text("files-0-id", "99")
            .with_text("files-0-name", "Hijack")
            .with_text("files-0-DELETE", "on");
        let formset = FileFormset::bind("files", &mut data, &[stored(1)], LIMIT);

        assert!(!formset.is_valid());
        assert!(formset.forms[0].errors.contains_key("id"));
    }

    #[test]
    fn test_repeated_id_is_rejected() {
        let mut data = FormData::default()
            .with_text("files-TOTAL_FORMS", "2")
            .with_text("files-0-id", "1")
            .with_text("files-0-DELETE", "on")
            .with_text("files-1-id", "1")
            .with_text("files-1-name", "Again");
        let formset = FileFormset::bind("files", &mut data, &[stored(1)], LIMIT);

        assert!(!formset.is_valid());
        assert!(formset.forms[0].errors.is_empty());
        assert_eq!(
            formset.forms[1].errors["id"],
            vec!["Please correct the duplicate data for id.".to_string()]
        );
        assert_eq!(formset.into_changes(), vec![FileChange::Delete { id: 1 }]);
    }
}
