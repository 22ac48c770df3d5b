mod file_service;

pub use file_service::{
    delete_records_for_owner, delete_records_for_post, ensure_owner_exists, staged_keys,
    FileService, StagedChange,
};
