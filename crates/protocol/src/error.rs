use serde::{Deserialize, Serialize};

/// Broad class of a failure, used to decide how much detail a client sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or missing input. Nothing was mutated.
    Validation,
    /// Input was well-formed but the current state forbids the operation.
    Precondition,
    /// The produced artifact failed a post-write check and was discarded.
    Integrity,
    /// Storage or collaborator failure.
    Internal,
}

/// Stable machine-readable failure reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    EmptyFile,
    EmptyChunk,
    MissingFingerprint,
    InvalidFingerprint,
    InvalidName,
    InvalidPath,
    InvalidArgument,
    MissingChunk,
    FolderExists,
    MergeInProgress,
    SizeMismatch,
    DigestMismatch,
    StorageFailure,
    CatalogFailure,
    TrackerFailure,
}

impl ErrorCode {
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorCode::EmptyFile
            | ErrorCode::EmptyChunk
            | ErrorCode::MissingFingerprint
            | ErrorCode::InvalidFingerprint
            | ErrorCode::InvalidName
            | ErrorCode::InvalidPath
            | ErrorCode::InvalidArgument => ErrorCategory::Validation,
            ErrorCode::MissingChunk | ErrorCode::FolderExists | ErrorCode::MergeInProgress => {
                ErrorCategory::Precondition
            }
            ErrorCode::SizeMismatch | ErrorCode::DigestMismatch => ErrorCategory::Integrity,
            ErrorCode::StorageFailure | ErrorCode::CatalogFailure | ErrorCode::TrackerFailure => {
                ErrorCategory::Internal
            }
        }
    }

    /// HTTP status a request layer should answer with.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::FolderExists | ErrorCode::MergeInProgress => 409,
            code => match code.category() {
                ErrorCategory::Validation | ErrorCategory::Precondition => 400,
                ErrorCategory::Integrity | ErrorCategory::Internal => 500,
            },
        }
    }

    /// Whether the caller can fix the request and retry.
    pub fn is_client_error(self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::Precondition
        )
    }
}

/// Error payload returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
