//! Per-fingerprint staging areas holding raw chunks until merge.
//!
//! Layout: `<root>/<fingerprint>/chunk_<index>`. A chunk is written to a
//! temporary name and renamed into place, so a reader never observes a
//! half-written chunk and a resend of the same index replaces the old one.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::types::{StagedSession, SweepReport};
use crate::{CHUNK_FILE_PREFIX, TransferError};

/// On-disk chunk staging keyed by fingerprint.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
}

impl ChunkStore {
    /// Creates a store rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures the staging root exists.
    pub async fn prepare(&self) -> Result<(), TransferError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Directory holding the chunks of one upload.
    pub fn session_dir(&self, fingerprint: &str) -> PathBuf {
        self.root.join(fingerprint)
    }

    /// Path of a single staged chunk.
    pub fn chunk_path(&self, fingerprint: &str, index: u32) -> PathBuf {
        self.session_dir(fingerprint)
            .join(format!("{CHUNK_FILE_PREFIX}{index}"))
    }

    /// Writes (or overwrites) chunk `index` for `fingerprint`.
    pub async fn write_chunk(
        &self,
        fingerprint: &str,
        index: u32,
        data: &[u8],
    ) -> Result<(), TransferError> {
        let dir = self.session_dir(fingerprint);
        tokio::fs::create_dir_all(&dir).await?;

        let final_path = self.chunk_path(fingerprint, index);
        let temp_path = dir.join(format!(
            ".tmp.{CHUNK_FILE_PREFIX}{index}.{}",
            uuid::Uuid::new_v4()
        ));

        if let Err(e) = tokio::fs::write(&temp_path, data).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(fingerprint, index, bytes = data.len(), "chunk staged");
        Ok(())
    }

    /// Returns `true` if chunk `index` is staged.
    pub async fn has_chunk(&self, fingerprint: &str, index: u32) -> Result<bool, TransferError> {
        Ok(tokio::fs::try_exists(self.chunk_path(fingerprint, index)).await?)
    }

    /// Returns the lowest index in `0..total_chunks` that is not staged.
    pub async fn first_missing(
        &self,
        fingerprint: &str,
        total_chunks: u32,
    ) -> Result<Option<u32>, TransferError> {
        for index in 0..total_chunks {
            if !self.has_chunk(fingerprint, index).await? {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Opens a staged chunk for reading.
    pub async fn open_chunk(
        &self,
        fingerprint: &str,
        index: u32,
    ) -> Result<tokio::fs::File, TransferError> {
        Ok(tokio::fs::File::open(self.chunk_path(fingerprint, index)).await?)
    }

    /// Deletes the staging area of one upload. A missing area is not an error.
    pub async fn remove_session(&self, fingerprint: &str) -> Result<(), TransferError> {
        match tokio::fs::remove_dir_all(self.session_dir(fingerprint)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists every staging area currently on disk.
    pub async fn list_sessions(&self) -> Result<Vec<StagedSession>, TransferError> {
        let mut sessions = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(sessions),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path();
            let last_modified = last_modified_in(&path).await?;
            sessions.push(StagedSession {
                fingerprint: name,
                path,
                last_modified,
            });
        }

        Ok(sessions)
    }

    /// Removes staging areas untouched for longer than `max_age`.
    pub async fn sweep(&self, max_age: Duration) -> Result<SweepReport, TransferError> {
        self.sweep_at(max_age, SystemTime::now()).await
    }

    /// Like [`sweep`](Self::sweep) with an explicit notion of "now".
    pub async fn sweep_at(
        &self,
        max_age: Duration,
        now: SystemTime,
    ) -> Result<SweepReport, TransferError> {
        let mut report = SweepReport::default();

        for session in self.list_sessions().await? {
            report.scanned += 1;
            let age = now
                .duration_since(session.last_modified)
                .unwrap_or(Duration::ZERO);
            if age <= max_age {
                continue;
            }

            match tokio::fs::remove_dir_all(&session.path).await {
                Ok(()) => {
                    report.removed += 1;
                    debug!(
                        fingerprint = %session.fingerprint,
                        age_secs = age.as_secs(),
                        "removed stale staging area"
                    );
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        fingerprint = %session.fingerprint,
                        error = %e,
                        "failed to remove stale staging area"
                    );
                }
            }
        }

        Ok(report)
    }
}

/// Latest modification time of a directory and its direct children.
async fn last_modified_in(dir: &Path) -> Result<SystemTime, TransferError> {
    let mut latest = tokio::fs::metadata(dir).await?.modified()?;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) {
            latest = latest.max(modified);
        }
    }
    Ok(latest)
}
