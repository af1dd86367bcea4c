use std::path::PathBuf;
use std::time::SystemTime;

/// A staging area found on disk.
#[derive(Debug, Clone)]
pub struct StagedSession {
    /// Directory name, normally the upload's fingerprint.
    pub fingerprint: String,
    pub path: PathBuf,
    /// Most recent modification of the directory or any chunk in it.
    pub last_modified: SystemTime,
}

/// Outcome of one staging sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.removed == 0 && self.failed == 0
    }
}
