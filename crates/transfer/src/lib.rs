//! Storage primitives for chunked, content-addressed uploads.
//!
//! - [`fingerprint`]: content digests used as dedup and session keys
//! - [`staging`]: per-fingerprint chunk staging areas
//! - [`blob`]: finalized artifacts and folders
//! - [`progress`]: the key/set store that tracks received chunk indices

pub mod blob;
pub mod fingerprint;
pub mod media;
pub mod progress;
pub mod staging;
mod types;
mod validation;

pub use blob::{BlobStore, BlobWriter, CreatedFolder};
pub use fingerprint::{FingerprintAlgorithm, Fingerprinter};
pub use media::media_type_for;
pub use progress::{MemoryProgressTracker, ProgressTracker, TrackerError, TrackerFuture};
pub use staging::ChunkStore;
pub use types::{StagedSession, SweepReport};
pub use validation::{logical_parent_path, validate_entry_name, validate_parent_path};

use std::time::Duration;

/// Directory name of the staging area under the upload root.
pub const STAGING_DIR_NAME: &str = ".chunks";

/// File name prefix of a staged chunk (`chunk_<index>`).
pub const CHUNK_FILE_PREFIX: &str = "chunk_";

/// Prefix of in-flight artifacts that have not been given their final name.
pub const PARTIAL_FILE_PREFIX: &str = ".partial-";

/// Retention window of an unmerged upload session: 7 days.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Copy buffer used when streaming chunks into an artifact.
pub const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),
}
