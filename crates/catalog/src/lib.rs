//! Durable index of logical files and folders.
//!
//! The catalog owns record identity: ids and timestamps are assigned on
//! insert. [`MetadataCatalog`] is the contract the ingest core depends on;
//! [`MemoryCatalog`] is a process-local implementation.

mod memory;

pub use memory::MemoryCatalog;

use std::future::Future;
use std::pin::Pin;

use netdisk_protocol::{FileRecord, NewFileRecord};

/// Errors produced by a catalog backend.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("rejected record: {0}")]
    Rejected(String),
}

/// A boxed future returned by catalog methods.
pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CatalogError>> + Send + 'a>>;

/// Abstract metadata store. Implementations must serialize concurrent inserts.
pub trait MetadataCatalog: Send + Sync {
    /// Persists a record and returns it with its assigned id and timestamps.
    fn insert(&self, record: NewFileRecord) -> CatalogFuture<'_, FileRecord>;

    /// Returns any non-folder record whose fingerprint equals `fingerprint`.
    fn find_by_fingerprint<'a>(&'a self, fingerprint: &'a str)
    -> CatalogFuture<'a, Option<FileRecord>>;

    /// Looks a record up by id.
    fn get(&self, id: i64) -> CatalogFuture<'_, Option<FileRecord>>;
}
