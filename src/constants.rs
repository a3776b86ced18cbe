pub const P_NAMESPACE: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub const A_NAMESPACE: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const RELS_NAMESPACE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const TABLE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/table";
pub const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

pub const PPTX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const VIDEO_MIME_TYPE: &str = "video/mp4";

/// Downloads smaller than this are treated as broken placeholders, not videos.
pub const MIN_VIDEO_BYTES: u64 = 1024;
