use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical root of the file tree.
pub const ROOT_PATH: &str = "/";

/// Whether a record describes a regular file or a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "folder")]
    Folder,
}

/// One logical file or folder as recorded by the metadata catalog.
///
/// Several records may point at the same `physical_path` when their content
/// fingerprints match (instant upload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    pub name: String,
    pub physical_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub parent_path: String,
    pub kind: FileKind,
    /// Opaque principal reference. Not validated or resolved here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn is_folder(&self) -> bool {
        self.kind == FileKind::Folder
    }

    /// Compact summary returned to clients after an upload.
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            id: self.id,
            filename: self.name.clone(),
            path: self.physical_path.clone(),
            size: self.size,
            md5: self.fingerprint.clone(),
        }
    }

    /// Compact summary returned to clients after folder creation.
    pub fn folder_summary(&self) -> FolderSummary {
        FolderSummary {
            id: self.id,
            filename: self.name.clone(),
            path: self.physical_path.clone(),
            parent_path: self.parent_path.clone(),
        }
    }
}

/// A record that has not been persisted yet.
///
/// The catalog assigns `id` and timestamps on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFileRecord {
    pub name: String,
    pub physical_path: String,
    pub fingerprint: Option<String>,
    pub size: u64,
    pub media_type: Option<String>,
    pub parent_path: String,
    pub kind: FileKind,
    pub owner: Option<String>,
}

impl NewFileRecord {
    /// Builds a file record. An empty `parent_path` is treated as the root.
    pub fn file(
        name: impl Into<String>,
        physical_path: impl Into<String>,
        fingerprint: impl Into<String>,
        size: u64,
        media_type: impl Into<String>,
        parent_path: &str,
        owner: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            physical_path: physical_path.into(),
            fingerprint: Some(fingerprint.into()),
            size,
            media_type: Some(media_type.into()),
            parent_path: normalize_parent(parent_path),
            kind: FileKind::File,
            owner,
        }
    }

    /// Builds a folder record: no fingerprint, zero size, no media type.
    pub fn folder(
        name: impl Into<String>,
        physical_path: impl Into<String>,
        parent_path: &str,
        owner: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            physical_path: physical_path.into(),
            fingerprint: None,
            size: 0,
            media_type: None,
            parent_path: normalize_parent(parent_path),
            kind: FileKind::Folder,
            owner,
        }
    }

    /// Attaches identity and timestamps, producing a stored record.
    pub fn into_record(self, id: i64, now: DateTime<Utc>) -> FileRecord {
        FileRecord {
            id,
            name: self.name,
            physical_path: self.physical_path,
            fingerprint: self.fingerprint,
            size: self.size,
            media_type: self.media_type,
            parent_path: self.parent_path,
            kind: self.kind,
            owner: self.owner,
            created_at: now,
            updated_at: now,
        }
    }
}

fn normalize_parent(parent_path: &str) -> String {
    if parent_path.trim().is_empty() {
        ROOT_PATH.to_string()
    } else {
        parent_path.to_string()
    }
}

/// File fields echoed back after upload, check or merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: i64,
    pub filename: String,
    pub path: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

/// Folder fields echoed back after folder creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderSummary {
    pub id: i64,
    pub filename: String,
    pub path: String,
    pub parent_path: String,
}
