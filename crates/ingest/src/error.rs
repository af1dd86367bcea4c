//! Ingest error types.

use netdisk_catalog::CatalogError;
use netdisk_protocol::{ErrorBody, ErrorCategory, ErrorCode};
use netdisk_transfer::{TrackerError, TransferError};

/// Errors produced by upload orchestration.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("file is empty")]
    EmptyFile,

    #[error("chunk {index} is empty")]
    EmptyChunk { index: u32 },

    #[error("fingerprint is required")]
    MissingFingerprint,

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("chunk {index} is missing")]
    MissingChunk { index: u32 },

    #[error("folder already exists: {0}")]
    FolderExists(String),

    #[error("a merge for {0} is already in progress")]
    MergeInProgress(String),

    #[error("merged size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("merged content does not match fingerprint {expected}")]
    DigestMismatch { expected: String, actual: String },

    #[error("storage error: {0}")]
    Storage(TransferError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),
}

impl From<TransferError> for IngestError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::InvalidFingerprint(msg) => IngestError::InvalidFingerprint(msg),
            TransferError::InvalidName(msg) => IngestError::InvalidName(msg),
            TransferError::InvalidPath(msg) => IngestError::InvalidPath(msg),
            other => IngestError::Storage(other),
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        IngestError::Storage(TransferError::Io(e))
    }
}

impl IngestError {
    /// Stable machine-readable reason.
    pub fn code(&self) -> ErrorCode {
        match self {
            IngestError::EmptyFile => ErrorCode::EmptyFile,
            IngestError::EmptyChunk { .. } => ErrorCode::EmptyChunk,
            IngestError::MissingFingerprint => ErrorCode::MissingFingerprint,
            IngestError::InvalidFingerprint(_) => ErrorCode::InvalidFingerprint,
            IngestError::InvalidName(_) => ErrorCode::InvalidName,
            IngestError::InvalidPath(_) => ErrorCode::InvalidPath,
            IngestError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            IngestError::MissingChunk { .. } => ErrorCode::MissingChunk,
            IngestError::FolderExists(_) => ErrorCode::FolderExists,
            IngestError::MergeInProgress(_) => ErrorCode::MergeInProgress,
            IngestError::SizeMismatch { .. } => ErrorCode::SizeMismatch,
            IngestError::DigestMismatch { .. } => ErrorCode::DigestMismatch,
            IngestError::Storage(_) => ErrorCode::StorageFailure,
            IngestError::Catalog(_) => ErrorCode::CatalogFailure,
            IngestError::Tracker(_) => ErrorCode::TrackerFailure,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }

    /// Client-facing payload.
    ///
    /// Validation and precondition faults keep their detail. A size mismatch
    /// reports expected and actual lengths. Everything else is generic; the
    /// detail only goes to the log.
    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            IngestError::SizeMismatch { .. } => self.to_string(),
            IngestError::DigestMismatch { .. } => {
                "merged file failed integrity verification".to_string()
            }
            IngestError::Storage(_) | IngestError::Catalog(_) | IngestError::Tracker(_) => {
                "upload failed due to an internal error".to_string()
            }
            _ => self.to_string(),
        };
        ErrorBody::new(self.code(), message)
    }
}

impl From<ErrorBody> for IngestError {
    /// Lifts a wire-level validation failure into the ingest taxonomy.
    fn from(body: ErrorBody) -> Self {
        match body.code {
            ErrorCode::MissingFingerprint => IngestError::MissingFingerprint,
            ErrorCode::InvalidFingerprint => IngestError::InvalidFingerprint(body.message),
            ErrorCode::InvalidName => IngestError::InvalidName(body.message),
            ErrorCode::InvalidPath => IngestError::InvalidPath(body.message),
            _ => IngestError::InvalidArgument(body.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_validation_errors_keep_their_code() {
        let err: IngestError = TransferError::InvalidName("a/b".into()).into();
        assert_eq!(err.code(), ErrorCode::InvalidName);

        let err: IngestError = TransferError::InvalidPath("..".into()).into();
        assert_eq!(err.code(), ErrorCode::InvalidPath);

        let err: IngestError = std::io::Error::other("disk full").into();
        assert_eq!(err.code(), ErrorCode::StorageFailure);
    }

    #[test]
    fn precondition_body_names_the_index() {
        let body = IngestError::MissingChunk { index: 3 }.to_body();
        assert_eq!(body.code, ErrorCode::MissingChunk);
        assert!(body.message.contains('3'));
    }

    #[test]
    fn size_mismatch_reports_lengths() {
        let body = IngestError::SizeMismatch {
            expected: 5,
            actual: 6,
        }
        .to_body();
        assert!(body.message.contains('5') && body.message.contains('6'));
    }

    #[test]
    fn internal_detail_is_hidden() {
        let err: IngestError = std::io::Error::other("/srv/uploads: permission denied").into();
        let body = err.to_body();
        assert_eq!(body.code, ErrorCode::StorageFailure);
        assert!(!body.message.contains("/srv"));

        let body = IngestError::DigestMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .to_body();
        assert!(!body.message.contains("bb"));
    }

    #[test]
    fn wire_validation_maps_to_ingest_codes() {
        let err: IngestError =
            ErrorBody::new(ErrorCode::MissingFingerprint, "fingerprint must not be empty").into();
        assert!(matches!(err, IngestError::MissingFingerprint));

        let err: IngestError = ErrorBody::new(ErrorCode::InvalidArgument, "bad").into();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(err.category(), ErrorCategory::Validation);
    }
}
