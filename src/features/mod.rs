pub mod admin;
pub mod comments;
pub mod files;
pub mod posts;
