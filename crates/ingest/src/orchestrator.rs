//! Upload orchestrator: whole-file uploads, chunk staging, resume queries,
//! merges and folder creation.
//!
//! Every success path inserts its catalog record last. Cleanup of staging
//! state after a successful merge or dedup is best-effort and only logged.

use std::path::Path;
use std::sync::Arc;

use netdisk_catalog::MetadataCatalog;
use netdisk_protocol::{FileRecord, NewFileRecord, ROOT_PATH};
use netdisk_transfer::{
    BlobStore, BlobWriter, COPY_BUFFER_SIZE, ChunkStore, FingerprintAlgorithm, Fingerprinter,
    ProgressTracker, SweepReport, TransferError, logical_parent_path, media_type_for,
    validate_entry_name,
};
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info, warn};

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::sessions::UploadSessions;
use crate::types::{ChunkReceipt, MergeRequest, UploadOutcome};

/// Coordinates the chunk store, blob store, progress tracker and catalog.
pub struct UploadOrchestrator {
    config: IngestConfig,
    blobs: BlobStore,
    chunks: ChunkStore,
    sessions: UploadSessions,
    catalog: Arc<dyn MetadataCatalog>,
}

impl UploadOrchestrator {
    pub fn new(
        config: IngestConfig,
        tracker: Arc<dyn ProgressTracker>,
        catalog: Arc<dyn MetadataCatalog>,
    ) -> Self {
        let upload_root =
            std::path::absolute(&config.upload_dir).unwrap_or_else(|_| config.upload_dir.clone());
        let staging_root = config.staging_root();
        let staging_root = std::path::absolute(&staging_root).unwrap_or(staging_root);

        Self {
            blobs: BlobStore::new(upload_root).with_reserved(&staging_root),
            chunks: ChunkStore::new(staging_root),
            sessions: UploadSessions::new(tracker, config.session_ttl()),
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn blob_store(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn chunk_store(&self) -> &ChunkStore {
        &self.chunks
    }

    /// Creates the blob and staging roots if they are missing.
    pub async fn prepare(&self) -> Result<(), IngestError> {
        self.blobs.prepare().await?;
        self.chunks.prepare().await?;
        info!(
            upload_dir = %self.blobs.root().display(),
            staging_dir = %self.chunks.root().display(),
            "storage prepared"
        );
        Ok(())
    }

    /// Looks up stored content with this fingerprint.
    ///
    /// `name` is informational only; dedup is keyed purely on content.
    pub async fn check_existing(
        &self,
        fingerprint: &str,
        name: &str,
    ) -> Result<Option<FileRecord>, IngestError> {
        let fingerprint = self.parse_fingerprint(fingerprint)?;
        let existing = self.catalog.find_by_fingerprint(&fingerprint).await?;
        debug!(fingerprint = %fingerprint, name, hit = existing.is_some(), "dedup check");
        Ok(existing)
    }

    /// Stores a complete file, or aliases existing content with the same digest.
    pub async fn upload_whole(
        &self,
        data: &[u8],
        name: &str,
        parent_path: Option<&str>,
        owner: Option<String>,
    ) -> Result<UploadOutcome, IngestError> {
        if data.is_empty() {
            return Err(IngestError::EmptyFile);
        }
        validate_entry_name(name)?;
        let parent = self.resolve_parent(parent_path)?;
        let parent = parent.as_str();

        let fingerprint = digest_in_slices(self.config.fingerprint, data).await;
        let size = data.len() as u64;

        if let Some(existing) = self.catalog.find_by_fingerprint(&fingerprint).await? {
            return self
                .alias_existing(existing, &fingerprint, name, size, parent, owner)
                .await;
        }

        let path = self.blobs.write_file(parent, name, data).await?;
        let record = NewFileRecord::file(
            name,
            path.to_string_lossy(),
            fingerprint.as_str(),
            size,
            media_type_for(name),
            parent,
            owner,
        );
        let stored = self.insert_or_discard(record, &path).await?;

        info!(
            id = stored.id,
            fingerprint = %fingerprint,
            name,
            bytes = size,
            path = %path.display(),
            "file uploaded"
        );
        Ok(UploadOutcome::stored(stored))
    }

    /// Stages one chunk and records it in the session.
    ///
    /// Resending an index overwrites the staged bytes.
    pub async fn store_chunk(
        &self,
        fingerprint: &str,
        index: u32,
        data: &[u8],
    ) -> Result<ChunkReceipt, IngestError> {
        let fingerprint = self.parse_fingerprint(fingerprint)?;
        if data.is_empty() {
            return Err(IngestError::EmptyChunk { index });
        }

        self.chunks.write_chunk(&fingerprint, index, data).await?;
        self.sessions.record_chunk(&fingerprint, index).await?;

        debug!(fingerprint = %fingerprint, index, bytes = data.len(), "chunk stored");
        Ok(ChunkReceipt {
            fingerprint,
            index,
            bytes: data.len(),
        })
    }

    /// Chunk indices received so far, ascending. Empty once the session expires.
    pub async fn list_received_chunks(&self, fingerprint: &str) -> Result<Vec<u32>, IngestError> {
        let fingerprint = self.parse_fingerprint(fingerprint)?;
        Ok(self.sessions.received(&fingerprint).await?)
    }

    /// Assembles staged chunks `0..total_chunks` into one artifact.
    ///
    /// At most one merge per fingerprint runs at a time; a concurrent call
    /// fails with [`IngestError::MergeInProgress`].
    pub async fn merge(&self, req: MergeRequest) -> Result<UploadOutcome, IngestError> {
        let fingerprint = self.parse_fingerprint(&req.fingerprint)?;
        validate_entry_name(&req.name)?;
        let parent = self.resolve_parent(req.parent_path.as_deref())?;
        if req.total_chunks == 0 {
            return Err(IngestError::InvalidArgument(
                "totalChunks must be at least 1".into(),
            ));
        }

        let Some(lease) = self
            .sessions
            .try_lock(&fingerprint, self.config.merge_lock_ttl())
            .await?
        else {
            return Err(IngestError::MergeInProgress(fingerprint));
        };

        // Dropping this future mid-merge drops the lease, which frees the lock.
        let result = self.merge_locked(&fingerprint, &req, &parent).await;
        lease.release().await;
        result
    }

    async fn merge_locked(
        &self,
        fingerprint: &str,
        req: &MergeRequest,
        parent: &str,
    ) -> Result<UploadOutcome, IngestError> {
        if let Some(existing) = self.catalog.find_by_fingerprint(fingerprint).await? {
            let outcome = self
                .alias_existing(
                    existing,
                    fingerprint,
                    &req.name,
                    req.total_size,
                    parent,
                    req.owner.clone(),
                )
                .await?;
            self.discard_session(fingerprint).await;
            return Ok(outcome);
        }

        if let Some(index) = self
            .chunks
            .first_missing(fingerprint, req.total_chunks)
            .await?
        {
            debug!(fingerprint, index, total = req.total_chunks, "merge blocked on missing chunk");
            return Err(IngestError::MissingChunk { index });
        }

        let mut writer = self.blobs.begin(parent).await?;
        let mut hasher = self
            .config
            .verify_merged_digest
            .then(|| self.config.fingerprint.hasher());

        if let Err(e) = self
            .copy_chunks(fingerprint, req.total_chunks, &mut writer, hasher.as_mut())
            .await
        {
            writer.abort().await;
            return Err(e);
        }

        let actual = match writer.len_on_disk().await {
            Ok(len) => len,
            Err(e) => {
                writer.abort().await;
                return Err(e.into());
            }
        };
        if actual != req.total_size {
            writer.abort().await;
            error!(
                fingerprint,
                expected = req.total_size,
                actual,
                "merged size mismatch, artifact discarded"
            );
            return Err(IngestError::SizeMismatch {
                expected: req.total_size,
                actual,
            });
        }

        if let Some(hasher) = hasher {
            let digest = hasher.finalize_hex();
            if digest != fingerprint {
                writer.abort().await;
                error!(
                    fingerprint,
                    digest = %digest,
                    "merged digest mismatch, artifact discarded"
                );
                return Err(IngestError::DigestMismatch {
                    expected: fingerprint.to_string(),
                    actual: digest,
                });
            }
        }

        let path = writer.finish(&req.name).await?;
        let record = NewFileRecord::file(
            req.name.as_str(),
            path.to_string_lossy(),
            fingerprint,
            req.total_size,
            media_type_for(&req.name),
            parent,
            req.owner.clone(),
        );
        let stored = self.insert_or_discard(record, &path).await?;
        self.discard_session(fingerprint).await;

        info!(
            id = stored.id,
            fingerprint,
            name = %req.name,
            chunks = req.total_chunks,
            bytes = req.total_size,
            path = %path.display(),
            "chunks merged"
        );
        Ok(UploadOutcome::merged(stored))
    }

    /// Streams chunks into `writer` in strict index order.
    async fn copy_chunks(
        &self,
        fingerprint: &str,
        total_chunks: u32,
        writer: &mut BlobWriter,
        mut hasher: Option<&mut Fingerprinter>,
    ) -> Result<(), IngestError> {
        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        for index in 0..total_chunks {
            let mut chunk = match self.chunks.open_chunk(fingerprint, index).await {
                Ok(file) => file,
                Err(TransferError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(IngestError::MissingChunk { index });
                }
                Err(e) => return Err(e.into()),
            };
            loop {
                let n = chunk.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                writer.write_all(&buf[..n]).await?;
                if let Some(h) = hasher.as_deref_mut() {
                    h.update(&buf[..n]);
                }
            }
        }
        Ok(())
    }

    /// Creates an empty folder and its catalog record.
    pub async fn create_folder(
        &self,
        name: &str,
        parent_path: Option<&str>,
        owner: Option<String>,
    ) -> Result<FileRecord, IngestError> {
        validate_entry_name(name)?;
        let parent = self.resolve_parent(parent_path)?;

        let created = match self.blobs.create_folder(&parent, name).await {
            Ok(created) => created,
            Err(TransferError::AlreadyExists(path)) => {
                return Err(IngestError::FolderExists(path));
            }
            Err(e) => return Err(e.into()),
        };

        let record = NewFileRecord::folder(name, created.path.to_string_lossy(), &parent, owner);
        let stored = match self.catalog.insert(record).await {
            Ok(stored) => stored,
            Err(e) => {
                self.blobs.rollback_folder(&created).await;
                return Err(e.into());
            }
        };

        info!(id = stored.id, name, path = %created.path.display(), "folder created");
        Ok(stored)
    }

    /// Removes staging areas idle for longer than the session TTL.
    pub async fn reap_stale_staging(&self) -> Result<SweepReport, IngestError> {
        let report = self.chunks.sweep(self.config.session_ttl()).await?;
        if !report.is_empty() {
            info!(
                scanned = report.scanned,
                removed = report.removed,
                failed = report.failed,
                "staging sweep finished"
            );
        }
        Ok(report)
    }

    /// Validates a caller's parent path and returns its canonical logical form.
    ///
    /// Paths that land inside the staging area are rejected.
    fn resolve_parent(&self, parent_path: Option<&str>) -> Result<String, IngestError> {
        let parent = parent_path.unwrap_or(ROOT_PATH);
        self.blobs.resolve_dir(parent)?;
        Ok(logical_parent_path(parent)?)
    }

    fn parse_fingerprint(&self, fingerprint: &str) -> Result<String, IngestError> {
        if fingerprint.trim().is_empty() {
            return Err(IngestError::MissingFingerprint);
        }
        Ok(self.config.fingerprint.parse(fingerprint)?)
    }

    /// Records a new logical file pointing at an existing blob.
    ///
    /// The caller's size is trusted; a divergence is only logged.
    async fn alias_existing(
        &self,
        existing: FileRecord,
        fingerprint: &str,
        name: &str,
        size: u64,
        parent: &str,
        owner: Option<String>,
    ) -> Result<UploadOutcome, IngestError> {
        if existing.size != size {
            warn!(
                fingerprint,
                recorded = existing.size,
                claimed = size,
                "dedup size differs from stored blob"
            );
        }

        let record = NewFileRecord::file(
            name,
            existing.physical_path.as_str(),
            fingerprint,
            size,
            media_type_for(name),
            parent,
            owner,
        );
        let stored = self.catalog.insert(record).await?;

        info!(
            id = stored.id,
            source_id = existing.id,
            fingerprint,
            name,
            "instant upload"
        );
        Ok(UploadOutcome::deduplicated(stored))
    }

    /// Inserts `record`, deleting the freshly written artifact if the catalog refuses it.
    async fn insert_or_discard(
        &self,
        record: NewFileRecord,
        path: &Path,
    ) -> Result<FileRecord, IngestError> {
        match self.catalog.insert(record).await {
            Ok(stored) => Ok(stored),
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(path).await {
                    warn!(path = %path.display(), error = %rm, "failed to remove unrecorded artifact");
                }
                Err(e.into())
            }
        }
    }

    /// Drops staged chunks and the tracker entry. Failures are logged only.
    async fn discard_session(&self, fingerprint: &str) {
        if let Err(e) = self.chunks.remove_session(fingerprint).await {
            warn!(fingerprint, error = %e, "failed to remove staging area");
        }
        if let Err(e) = self.sessions.clear(fingerprint).await {
            warn!(fingerprint, error = %e, "failed to clear upload session");
        }
    }
}

/// Hashes `data` in buffer-sized slices, yielding to the scheduler between them.
async fn digest_in_slices(algorithm: FingerprintAlgorithm, data: &[u8]) -> String {
    let mut hasher = algorithm.hasher();
    for slice in data.chunks(COPY_BUFFER_SIZE) {
        hasher.update(slice);
        tokio::task::yield_now().await;
    }
    hasher.finalize_hex()
}
