//! Data types for the ingest flow.

use netdisk_protocol::FileRecord;
use netdisk_protocol::messages::{
    CheckFileResponse, ChunkUploadRequest, ChunkUploadResponse, CreateFolderResponse,
    MergeChunksRequest, UploadResponse,
};

use crate::error::IngestError;

/// How a successful upload was materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    /// Bytes were written as one artifact.
    Stored,
    /// Staged chunks were assembled into one artifact.
    Merged,
    /// Content already existed; the new record aliases the existing blob.
    Deduplicated,
}

/// Result of a whole-file upload or a merge.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub record: FileRecord,
    pub kind: UploadKind,
}

impl UploadOutcome {
    pub fn stored(record: FileRecord) -> Self {
        Self {
            record,
            kind: UploadKind::Stored,
        }
    }

    pub fn merged(record: FileRecord) -> Self {
        Self {
            record,
            kind: UploadKind::Merged,
        }
    }

    pub fn deduplicated(record: FileRecord) -> Self {
        Self {
            record,
            kind: UploadKind::Deduplicated,
        }
    }

    /// Whether no bytes were written because the content already existed.
    pub fn instant_upload(&self) -> bool {
        self.kind == UploadKind::Deduplicated
    }

    pub fn message(&self) -> &'static str {
        match self.kind {
            UploadKind::Stored => "file uploaded",
            UploadKind::Merged => "chunks merged",
            UploadKind::Deduplicated => "instant upload",
        }
    }

    pub fn into_response(self) -> UploadResponse {
        UploadResponse {
            success: true,
            message: self.message().to_string(),
            file: self.record.summary(),
            instant_upload: self.instant_upload(),
        }
    }
}

/// Acknowledgement of one staged chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReceipt {
    pub fingerprint: String,
    pub index: u32,
    pub bytes: usize,
}

impl ChunkReceipt {
    pub fn into_response(self) -> ChunkUploadResponse {
        ChunkUploadResponse {
            success: true,
            message: "chunk uploaded".to_string(),
            chunk_index: self.index,
        }
    }
}

/// Parameters of a merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub fingerprint: String,
    pub name: String,
    pub total_chunks: u32,
    pub total_size: u64,
    pub parent_path: Option<String>,
    pub owner: Option<String>,
}

impl MergeRequest {
    pub fn new(
        fingerprint: impl Into<String>,
        name: impl Into<String>,
        total_chunks: u32,
        total_size: u64,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            name: name.into(),
            total_chunks,
            total_size,
            parent_path: None,
            owner: None,
        }
    }

    pub fn with_parent_path(mut self, parent_path: impl Into<String>) -> Self {
        self.parent_path = Some(parent_path.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Validates a wire request and converts it.
    pub fn from_wire(req: MergeChunksRequest, owner: Option<String>) -> Result<Self, IngestError> {
        req.validate()?;
        Ok(Self {
            total_chunks: narrow("totalChunks", req.total_chunks)?,
            total_size: narrow("totalSize", req.total_size)?,
            fingerprint: req.fingerprint,
            name: req.filename,
            parent_path: req.parent_path,
            owner,
        })
    }
}

/// Answer to a dedup check.
pub fn check_response(existing: Option<&FileRecord>) -> CheckFileResponse {
    CheckFileResponse {
        exists: existing.is_some(),
        file: existing.map(FileRecord::summary),
    }
}

/// Answer to a successful folder creation.
pub fn folder_response(folder: &FileRecord) -> CreateFolderResponse {
    CreateFolderResponse {
        success: true,
        message: "folder created".to_string(),
        folder: folder.folder_summary(),
    }
}

/// Validates a chunk request and returns its index.
pub fn chunk_index_from_wire(req: &ChunkUploadRequest) -> Result<u32, IngestError> {
    req.validate()?;
    narrow("chunkIndex", req.chunk_index)
}

fn narrow<T: TryFrom<i64>>(field: &str, value: i64) -> Result<T, IngestError> {
    T::try_from(value)
        .map_err(|_| IngestError::InvalidArgument(format!("{field} out of range: {value}")))
}
