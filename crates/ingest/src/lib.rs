//! Chunked, resumable, content-addressed file ingestion.
//!
//! Clients either send a whole file or send chunks tagged with the content
//! fingerprint and an index, then ask for a merge. Identical content is
//! stored once: a second upload with a known fingerprint only gets a new
//! catalog record pointing at the existing blob ("instant upload").
//!
//! # Flow
//!
//! 1. **Check**: look the fingerprint up in the catalog
//! 2. **Stage**: write each chunk to `<staging>/<fingerprint>/chunk_<i>`
//! 3. **Resume**: list the indices the tracker has seen
//! 4. **Merge**: concatenate chunks by index, verify size and digest, record

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod reaper;
pub mod sessions;
pub mod types;

pub use config::IngestConfig;
pub use error::IngestError;
pub use orchestrator::UploadOrchestrator;
pub use reaper::StagingReaper;
pub use sessions::{MergeLease, UploadSessions};
pub use types::{
    ChunkReceipt, MergeRequest, UploadKind, UploadOutcome, check_response, chunk_index_from_wire,
    folder_response,
};
