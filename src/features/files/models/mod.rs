mod file;

pub use file::{AttachmentOwner, File, OwnerKind, StoredBlob};
