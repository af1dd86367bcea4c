use serde::{Deserialize, Serialize};

use crate::error::{ErrorBody, ErrorCode};
use crate::types::{FileSummary, FolderSummary};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Form fields sent alongside a whole-file upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
}

/// Asks whether content with this fingerprint is already stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckFileRequest {
    #[serde(alias = "md5")]
    pub fingerprint: String,
    pub filename: String,
}

impl CheckFileRequest {
    pub fn validate(&self) -> Result<(), ErrorBody> {
        require_fingerprint(&self.fingerprint)?;
        require_non_empty("filename", &self.filename)
    }
}

/// Form fields sent alongside one chunk of a chunked upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadRequest {
    #[serde(alias = "md5")]
    pub fingerprint: String,
    pub filename: String,
    pub chunk_index: i64,
    pub total_chunks: i64,
    pub total_size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
}

impl ChunkUploadRequest {
    pub fn validate(&self) -> Result<(), ErrorBody> {
        require_fingerprint(&self.fingerprint)?;
        require_non_empty("filename", &self.filename)?;
        require_min("chunkIndex", self.chunk_index, 0)?;
        require_min("totalChunks", self.total_chunks, 1)?;
        require_min("totalSize", self.total_size, 0)?;
        if self.chunk_index >= self.total_chunks {
            return Err(ErrorBody::new(
                ErrorCode::InvalidArgument,
                format!(
                    "chunkIndex {} is out of range for {} chunks",
                    self.chunk_index, self.total_chunks
                ),
            ));
        }
        Ok(())
    }
}

/// Requests assembly of all staged chunks into one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeChunksRequest {
    #[serde(alias = "md5")]
    pub fingerprint: String,
    pub filename: String,
    pub total_chunks: i64,
    pub total_size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
}

impl MergeChunksRequest {
    pub fn validate(&self) -> Result<(), ErrorBody> {
        require_fingerprint(&self.fingerprint)?;
        require_non_empty("filename", &self.filename)?;
        require_min("totalChunks", self.total_chunks, 1)?;
        require_min("totalSize", self.total_size, 0)
    }
}

/// Creates an empty folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub folder_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
}

impl CreateFolderRequest {
    pub fn validate(&self) -> Result<(), ErrorBody> {
        if self.folder_name.trim().is_empty() {
            return Err(ErrorBody::new(
                ErrorCode::InvalidName,
                "folder name must not be empty",
            ));
        }
        Ok(())
    }
}

fn require_fingerprint(value: &str) -> Result<(), ErrorBody> {
    if value.trim().is_empty() {
        return Err(ErrorBody::new(
            ErrorCode::MissingFingerprint,
            "fingerprint must not be empty",
        ));
    }
    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ErrorBody> {
    if value.trim().is_empty() {
        return Err(ErrorBody::new(
            ErrorCode::InvalidArgument,
            format!("{field} must not be empty"),
        ));
    }
    Ok(())
}

fn require_min(field: &str, value: i64, min: i64) -> Result<(), ErrorBody> {
    if value < min {
        return Err(ErrorBody::new(
            ErrorCode::InvalidArgument,
            format!("{field} must be at least {min}, got {value}"),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Result of a whole-file upload or a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub file: FileSummary,
    pub instant_upload: bool,
}

/// Result of a dedup check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckFileResponse {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileSummary>,
}

/// Acknowledges a stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUploadResponse {
    pub success: bool,
    pub message: String,
    pub chunk_index: u32,
}

/// Chunk indices already received for a fingerprint, ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkListResponse {
    pub success: bool,
    pub md5: String,
    pub uploaded_chunks: Vec<u32>,
    pub total_uploaded: usize,
}

impl ChunkListResponse {
    pub fn new(fingerprint: impl Into<String>, uploaded_chunks: Vec<u32>) -> Self {
        Self {
            success: true,
            md5: fingerprint.into(),
            total_uploaded: uploaded_chunks.len(),
            uploaded_chunks,
        }
    }
}

/// Result of folder creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateFolderResponse {
    pub success: bool,
    pub message: String,
    pub folder: FolderSummary,
}
