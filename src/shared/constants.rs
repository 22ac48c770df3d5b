/// Blank forms appended to every rendered file formset
pub const FILE_FORMSET_EXTRA: usize = 3;

/// Upper bound on TOTAL_FORMS accepted from a submission
pub const FILE_FORMSET_MAX_FORMS: usize = 1000;

/// Prefix of the post's own file formset
pub const POST_FILES_PREFIX: &str = "files";

/// Content type stored when the client does not send one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
