mod file_dto;

pub use file_dto::{FileListQuery, FileResponseDto, UpdateFileDto, UploadFileDto};
