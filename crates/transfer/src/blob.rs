//! Finalized artifacts and folders.
//!
//! Artifacts are streamed into a hidden `.partial-<uuid>` file in their
//! destination directory and only receive a visible name once the caller
//! calls [`BlobWriter::finish`]. Final names embed a millisecond timestamp
//! and are claimed with `create_new`, so concurrent writers never share a
//! path.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::validation::{validate_entry_name, validate_parent_path};
use crate::{PARTIAL_FILE_PREFIX, TransferError};

/// Upper bound on name-collision retries within one millisecond.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Directory tree of finalized files and folders.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    reserved: Option<PathBuf>,
}

/// A folder created by [`BlobStore::create_folder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedFolder {
    pub path: PathBuf,
    /// Ancestors that did not exist before the call, deepest first.
    pub new_ancestors: Vec<PathBuf>,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reserved: None,
        }
    }

    /// Excludes `dir` (and everything below it) from logical paths.
    ///
    /// Used for the staging area when it lives inside the blob root.
    pub fn with_reserved(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reserved = Some(dir.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensures the blob root exists.
    pub async fn prepare(&self) -> Result<(), TransferError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Maps a logical parent path onto a directory under the root.
    pub fn resolve_dir(&self, parent_path: &str) -> Result<PathBuf, TransferError> {
        let dir = self.root.join(validate_parent_path(parent_path)?);
        self.ensure_unreserved(&dir, parent_path)?;
        Ok(dir)
    }

    fn ensure_unreserved(&self, path: &Path, shown: &str) -> Result<(), TransferError> {
        match &self.reserved {
            Some(reserved) if path.starts_with(reserved) => Err(TransferError::InvalidPath(
                format!("reserved location: {shown}"),
            )),
            _ => Ok(()),
        }
    }

    /// Starts streaming a new artifact into `parent_path`.
    pub async fn begin(&self, parent_path: &str) -> Result<BlobWriter, TransferError> {
        let dir = self.resolve_dir(parent_path)?;
        tokio::fs::create_dir_all(&dir).await?;

        let temp_path = dir.join(format!("{PARTIAL_FILE_PREFIX}{}", uuid::Uuid::new_v4()));
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;

        Ok(BlobWriter {
            dir,
            temp_path: Some(temp_path),
            file: Some(file),
            written: 0,
        })
    }

    /// Writes a complete artifact in one go and returns its final path.
    pub async fn write_file(
        &self,
        parent_path: &str,
        name: &str,
        data: &[u8],
    ) -> Result<PathBuf, TransferError> {
        validate_entry_name(name)?;
        let mut writer = self.begin(parent_path).await?;
        if let Err(e) = writer.write_all(data).await {
            writer.abort().await;
            return Err(e);
        }
        writer.finish(name).await
    }

    /// Creates the folder `name` under `parent_path`.
    ///
    /// Fails with [`TransferError::AlreadyExists`] if anything already
    /// occupies the target path.
    pub async fn create_folder(
        &self,
        parent_path: &str,
        name: &str,
    ) -> Result<CreatedFolder, TransferError> {
        validate_entry_name(name)?;
        let dir = self.resolve_dir(parent_path)?;
        let target = dir.join(name);
        self.ensure_unreserved(&target, name)?;

        let mut new_ancestors = Vec::new();
        let mut cursor = dir.as_path();
        while cursor.starts_with(&self.root) && cursor != self.root.as_path() {
            if tokio::fs::try_exists(cursor).await? {
                break;
            }
            new_ancestors.push(cursor.to_path_buf());
            match cursor.parent() {
                Some(parent) => cursor = parent,
                None => break,
            }
        }

        tokio::fs::create_dir_all(&dir).await?;
        match tokio::fs::create_dir(&target).await {
            Ok(()) => Ok(CreatedFolder {
                path: target,
                new_ancestors,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(
                TransferError::AlreadyExists(target.to_string_lossy().into_owned()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Undoes [`create_folder`](Self::create_folder), including any parents
    /// it had to create. Directories that gained other entries meanwhile
    /// are left in place.
    pub async fn rollback_folder(&self, created: &CreatedFolder) {
        let dirs = std::iter::once(&created.path).chain(created.new_ancestors.iter());
        for dir in dirs {
            if let Err(e) = tokio::fs::remove_dir(dir).await {
                warn!(path = %dir.display(), error = %e, "folder rollback stopped");
                return;
            }
        }
    }
}

/// An artifact being written. Dropping it without calling
/// [`finish`](Self::finish) deletes the partial file.
pub struct BlobWriter {
    dir: PathBuf,
    temp_path: Option<PathBuf>,
    file: Option<tokio::fs::File>,
    written: u64,
}

impl BlobWriter {
    /// Appends `data` at the current end of the artifact.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), TransferError> {
        let file = self.file.as_mut().ok_or_else(closed_writer)?;
        file.write_all(data).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes handed to [`write_all`](Self::write_all) so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flushes and returns the artifact's length as reported by the filesystem.
    pub async fn len_on_disk(&mut self) -> Result<u64, TransferError> {
        let file = self.file.as_mut().ok_or_else(closed_writer)?;
        file.flush().await?;
        Ok(file.metadata().await?.len())
    }

    /// Syncs the artifact and gives it its final unique name derived from `name`.
    pub async fn finish(mut self, name: &str) -> Result<PathBuf, TransferError> {
        let Some(mut file) = self.file.take() else {
            return Err(closed_writer());
        };
        let Some(temp_path) = self.temp_path.clone() else {
            return Err(closed_writer());
        };

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let millis = chrono::Utc::now().timestamp_millis();
        let final_path = claim_unique_path(&self.dir, name, millis).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            let _ = tokio::fs::remove_file(&final_path).await;
            return Err(e.into());
        }

        self.temp_path = None;
        debug!(path = %final_path.display(), bytes = self.written, "artifact finalized");
        Ok(final_path)
    }

    /// Discards the partial artifact.
    pub async fn abort(mut self) {
        self.file.take();
        if let Some(temp_path) = self.temp_path.take() {
            if let Err(e) = tokio::fs::remove_file(&temp_path).await {
                warn!(path = %temp_path.display(), error = %e, "failed to remove partial artifact");
            }
        }
    }
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        self.file.take();
        let Some(temp_path) = self.temp_path.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = tokio::fs::remove_file(&temp_path).await {
                        warn!(path = %temp_path.display(), error = %e, "failed to remove partial artifact");
                    }
                });
            }
            Err(_) => {
                let _ = std::fs::remove_file(temp_path);
            }
        }
    }
}

fn closed_writer() -> TransferError {
    TransferError::Io(std::io::Error::other("artifact writer already closed"))
}

/// Builds `<stem>_<millis><ext>`, or `<stem>_<millis>-<attempt><ext>` on retries.
pub fn unique_file_name(name: &str, millis: i64, attempt: u32) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    if attempt == 0 {
        format!("{stem}_{millis}{ext}")
    } else {
        format!("{stem}_{millis}-{attempt}{ext}")
    }
}

/// Reserves a free final path by creating it exclusively.
async fn claim_unique_path(dir: &Path, name: &str, millis: i64) -> Result<PathBuf, TransferError> {
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let candidate = dir.join(unique_file_name(name, millis, attempt));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(TransferError::AlreadyExists(format!(
        "no free name for {name} in {}",
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, BlobStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = BlobStore::new(tmp.path().join("uploads"));
        (tmp, store)
    }

    fn visible_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn unique_name_keeps_extension() {
        assert_eq!(unique_file_name("report.pdf", 17, 0), "report_17.pdf");
        assert_eq!(unique_file_name("report.pdf", 17, 2), "report_17-2.pdf");
        assert_eq!(unique_file_name("archive.tar.gz", 5, 0), "archive.tar_5.gz");
        assert_eq!(unique_file_name("README", 5, 0), "README_5");
        assert_eq!(unique_file_name(".env", 5, 0), ".env_5");
    }

    #[tokio::test]
    async fn write_file_places_artifact_under_parent() {
        let (_tmp, store) = store();
        let path = store.write_file("/docs", "a.txt", b"hello").await.unwrap();

        assert!(path.starts_with(store.root().join("docs")));
        let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.starts_with("a_") && file_name.ends_with(".txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
        assert_eq!(visible_entries(&store.root().join("docs")).len(), 1);
    }

    #[tokio::test]
    async fn same_name_never_collides() {
        let (_tmp, store) = store();
        let a = store.write_file("/", "same.bin", b"one").await.unwrap();
        let b = store.write_file("/", "same.bin", b"two").await.unwrap();

        assert_ne!(a, b);
        assert_eq!(std::fs::read(&a).unwrap(), b"one");
        assert_eq!(std::fs::read(&b).unwrap(), b"two");
    }

    #[tokio::test]
    async fn claim_skips_taken_names() {
        let (_tmp, store) = store();
        store.prepare().await.unwrap();
        std::fs::write(store.root().join("x_9.txt"), b"taken").unwrap();

        let claimed = claim_unique_path(store.root(), "x.txt", 9).await.unwrap();
        assert_eq!(claimed, store.root().join("x_9-1.txt"));
        assert_eq!(std::fs::read(store.root().join("x_9.txt")).unwrap(), b"taken");
    }

    #[tokio::test]
    async fn partial_artifact_is_hidden_until_finish() {
        let (_tmp, store) = store();
        let mut writer = store.begin("/").await.unwrap();
        writer.write_all(b"abc").await.unwrap();
        writer.write_all(b"de").await.unwrap();

        assert_eq!(writer.bytes_written(), 5);
        assert_eq!(writer.len_on_disk().await.unwrap(), 5);
        assert!(visible_entries(store.root()).is_empty());

        let path = writer.finish("x.bin").await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"abcde");
        let all: Vec<_> = std::fs::read_dir(store.root()).unwrap().collect();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn abort_removes_partial_artifact() {
        let (_tmp, store) = store();
        let mut writer = store.begin("/").await.unwrap();
        writer.write_all(b"junk").await.unwrap();
        writer.abort().await;

        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn dropped_writer_removes_partial_artifact() {
        let (_tmp, store) = store();
        {
            let mut writer = store.begin("/").await.unwrap();
            writer.write_all(b"junk").await.unwrap();
        }
        for _ in 0..200 {
            if std::fs::read_dir(store.root()).unwrap().count() == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("partial artifact still present");
    }

    #[test]
    fn writer_dropped_outside_runtime_removes_partial_artifact() {
        let (_tmp, store) = store();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let writer = rt.block_on(async {
            let mut writer = store.begin("/").await.unwrap();
            writer.write_all(b"junk").await.unwrap();
            writer.len_on_disk().await.unwrap();
            writer
        });
        drop(rt);
        drop(writer);
        assert_eq!(std::fs::read_dir(store.root()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn write_file_rejects_illegal_names() {
        let (_tmp, store) = store();
        let result = store.write_file("/", "a/b.txt", b"x").await;
        assert!(matches!(result, Err(TransferError::InvalidName(_))));
    }

    #[tokio::test]
    async fn begin_rejects_traversal() {
        let (_tmp, store) = store();
        let result = store.begin("../outside").await;
        assert!(matches!(result, Err(TransferError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn create_folder_twice_fails() {
        let (_tmp, store) = store();
        let created = store.create_folder("/projects", "alpha").await.unwrap();
        assert!(created.path.is_dir());
        assert_eq!(created.path, store.root().join("projects").join("alpha"));

        let again = store.create_folder("/projects", "alpha").await;
        assert!(matches!(again, Err(TransferError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn create_folder_rejects_existing_file() {
        let (_tmp, store) = store();
        store.prepare().await.unwrap();
        std::fs::write(store.root().join("taken"), b"x").unwrap();

        let result = store.create_folder("/", "taken").await;
        assert!(matches!(result, Err(TransferError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn reserved_dir_is_not_addressable() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("uploads");
        let store = BlobStore::new(&root).with_reserved(root.join(".chunks"));

        for parent in ["/.chunks", ".chunks/", "/.chunks/abc", "/./.chunks"] {
            assert!(
                matches!(store.resolve_dir(parent), Err(TransferError::InvalidPath(_))),
                "{parent}"
            );
        }
        let folder = store.create_folder("/", ".chunks").await;
        assert!(matches!(folder, Err(TransferError::InvalidPath(_))));
        assert!(!root.join(".chunks").exists());

        assert!(store.resolve_dir("/.chunks-old").is_ok());
        assert!(store.resolve_dir("/docs/.chunks").is_ok());
    }

    #[tokio::test]
    async fn create_folder_reports_new_ancestors() {
        let (_tmp, store) = store();
        store.prepare().await.unwrap();
        std::fs::create_dir(store.root().join("a")).unwrap();

        let created = store.create_folder("/a/b/c", "leaf").await.unwrap();
        assert_eq!(
            created.new_ancestors,
            vec![
                store.root().join("a").join("b").join("c"),
                store.root().join("a").join("b"),
            ]
        );

        store.rollback_folder(&created).await;
        assert!(store.root().join("a").is_dir());
        assert!(!store.root().join("a").join("b").exists());
    }

    #[tokio::test]
    async fn rollback_keeps_ancestors_that_gained_entries() {
        let (_tmp, store) = store();
        let created = store.create_folder("/x/y", "leaf").await.unwrap();
        std::fs::write(store.root().join("x").join("other.txt"), b"keep").unwrap();

        store.rollback_folder(&created).await;
        assert!(!store.root().join("x").join("y").exists());
        assert!(store.root().join("x").join("other.txt").is_file());
    }
}
