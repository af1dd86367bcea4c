//! Upload sessions kept in the progress tracker.
//!
//! Received chunk indices live in the set `upload:chunks:<fingerprint>` and
//! expire after the session TTL unless refreshed by a new chunk. Merges are
//! serialized per fingerprint by a lease stored at `upload:lock:<fingerprint>`.

use std::sync::Arc;
use std::time::Duration;

use netdisk_transfer::{ProgressTracker, TrackerError};
use tracing::{debug, warn};

const SESSION_KEY_PREFIX: &str = "upload:chunks:";
const LOCK_KEY_PREFIX: &str = "upload:lock:";

pub fn session_key(fingerprint: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{fingerprint}")
}

pub fn lock_key(fingerprint: &str) -> String {
    format!("{LOCK_KEY_PREFIX}{fingerprint}")
}

/// A held merge lock.
///
/// Hand it back with [`release`](Self::release). A lease dropped without
/// being released (for example when the merge future is cancelled) frees
/// the lock from a background task on the current runtime.
#[must_use = "a merge lease must be released"]
pub struct MergeLease {
    tracker: Arc<dyn ProgressTracker>,
    key: String,
    token: String,
    released: bool,
}

impl std::fmt::Debug for MergeLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeLease")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl MergeLease {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the lock if it is still ours. Failures are logged.
    pub async fn release(mut self) {
        let outcome = self.tracker.delete_if_equals(&self.key, &self.token).await;
        self.released = true;
        match outcome {
            Ok(true) => debug!(key = %self.key, "merge lock released"),
            Ok(false) => warn!(key = %self.key, "merge lock expired before release"),
            Err(e) => warn!(key = %self.key, error = %e, "failed to release merge lock"),
        }
    }
}

impl Drop for MergeLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(key = %self.key, "merge lease dropped outside a runtime, lock left to expire");
            return;
        };
        let tracker = self.tracker.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        handle.spawn(async move {
            match tracker.delete_if_equals(&key, &token).await {
                Ok(true) => debug!(key = %key, "abandoned merge lock released"),
                Ok(false) => {}
                Err(e) => warn!(key = %key, error = %e, "failed to release abandoned merge lock"),
            }
        });
    }
}

/// Tracker-backed view of in-flight uploads.
#[derive(Clone)]
pub struct UploadSessions {
    tracker: Arc<dyn ProgressTracker>,
    ttl: Duration,
}

impl UploadSessions {
    pub fn new(tracker: Arc<dyn ProgressTracker>, ttl: Duration) -> Self {
        Self { tracker, ttl }
    }

    /// Marks chunk `index` as received and restarts the session TTL.
    pub async fn record_chunk(&self, fingerprint: &str, index: u32) -> Result<(), TrackerError> {
        let key = session_key(fingerprint);
        self.tracker.add_member(&key, &index.to_string()).await?;
        self.tracker.set_expiry(&key, self.ttl).await?;
        Ok(())
    }

    /// Received chunk indices, ascending.
    pub async fn received(&self, fingerprint: &str) -> Result<Vec<u32>, TrackerError> {
        let mut indices: Vec<u32> = self
            .tracker
            .members(&session_key(fingerprint))
            .await?
            .into_iter()
            .filter_map(|m| match m.parse() {
                Ok(index) => Some(index),
                Err(_) => {
                    warn!(fingerprint, member = %m, "ignoring malformed chunk index");
                    None
                }
            })
            .collect();
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    /// Forgets the session.
    pub async fn clear(&self, fingerprint: &str) -> Result<(), TrackerError> {
        self.tracker.delete_key(&session_key(fingerprint)).await
    }

    /// Tries to take the merge lock for `fingerprint`.
    ///
    /// Returns `None` if another merge holds it. A crashed holder's lease
    /// lapses after `ttl`.
    pub async fn try_lock(
        &self,
        fingerprint: &str,
        ttl: Duration,
    ) -> Result<Option<MergeLease>, TrackerError> {
        let key = lock_key(fingerprint);
        let token = uuid::Uuid::new_v4().to_string();
        if self.tracker.set_if_absent(&key, &token, ttl).await? {
            debug!(fingerprint, "merge lock acquired");
            Ok(Some(MergeLease {
                tracker: self.tracker.clone(),
                key,
                token,
                released: false,
            }))
        } else {
            Ok(None)
        }
    }

    /// Releases a lease if it is still ours. Failures are logged.
    pub async fn release(&self, lease: MergeLease) {
        lease.release().await;
    }
}
