//! Best-effort media type classification from a file name.

use std::path::Path;

/// Fallback for unknown or missing extensions.
pub const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

/// Maps a file name's extension to a media type (case-insensitive).
pub fn media_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("zip") => "application/zip",
        Some("rar") => "application/x-rar-compressed",
        _ => DEFAULT_MEDIA_TYPE,
    }
}
