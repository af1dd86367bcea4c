//! Tunables of the ingest core.

use std::path::PathBuf;
use std::time::Duration;

use netdisk_transfer::{FingerprintAlgorithm, STAGING_DIR_NAME};
use serde::{Deserialize, Serialize};

/// Ingest configuration. Every field has a default so partial files load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Root of the blob store.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Root of chunk staging. Defaults to `<upload_dir>/.chunks`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,

    /// Retention window of an unmerged upload session, in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Lease lifetime of the per-fingerprint merge lock, in seconds.
    #[serde(default = "default_merge_lock_ttl_secs")]
    pub merge_lock_ttl_secs: u64,

    /// Interval between staging sweeps, in seconds.
    #[serde(default = "default_reaper_interval_secs")]
    pub reaper_interval_secs: u64,

    #[serde(default)]
    pub fingerprint: FingerprintAlgorithm,

    /// Re-hash merged content and reject it if it does not match its fingerprint.
    #[serde(default = "default_true")]
    pub verify_merged_digest: bool,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_session_ttl_secs() -> u64 {
    netdisk_transfer::DEFAULT_SESSION_TTL.as_secs()
}

fn default_merge_lock_ttl_secs() -> u64 {
    15 * 60
}

fn default_reaper_interval_secs() -> u64 {
    60 * 60
}

fn default_true() -> bool {
    true
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            staging_dir: None,
            session_ttl_secs: default_session_ttl_secs(),
            merge_lock_ttl_secs: default_merge_lock_ttl_secs(),
            reaper_interval_secs: default_reaper_interval_secs(),
            fingerprint: FingerprintAlgorithm::default(),
            verify_merged_digest: default_true(),
        }
    }
}

impl IngestConfig {
    /// Config rooted at `upload_dir` with every other field defaulted.
    pub fn with_upload_dir(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            ..Self::default()
        }
    }

    pub fn staging_root(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| self.upload_dir.join(STAGING_DIR_NAME))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn merge_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.merge_lock_ttl_secs)
    }

    /// Sweep interval, never shorter than one second.
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }
}
