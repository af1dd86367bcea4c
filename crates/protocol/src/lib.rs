//! Wire types shared by the netdisk ingestion core and its request layer.

pub mod error;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use error::{ErrorBody, ErrorCategory, ErrorCode};
pub use types::{FileKind, FileRecord, FileSummary, FolderSummary, NewFileRecord, ROOT_PATH};
