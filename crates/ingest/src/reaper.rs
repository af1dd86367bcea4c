//! Periodic sweep of abandoned staging areas.

use std::sync::Arc;
use std::time::Duration;

use netdisk_transfer::MemoryProgressTracker;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::orchestrator::UploadOrchestrator;

/// Background task that reclaims staging areas older than the session TTL.
pub struct StagingReaper {
    orchestrator: Arc<UploadOrchestrator>,
    interval: Duration,
    tracker: Option<Arc<MemoryProgressTracker>>,
}

impl StagingReaper {
    /// Uses the interval configured on the orchestrator.
    pub fn new(orchestrator: Arc<UploadOrchestrator>) -> Self {
        let interval = orchestrator.config().reaper_interval();
        Self {
            orchestrator,
            interval,
            tracker: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Also drops expired keys from an in-process tracker on every pass.
    pub fn with_tracker_purge(mut self, tracker: Arc<MemoryProgressTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Runs one sweep. Errors are logged.
    pub async fn run_once(&self) {
        match self.orchestrator.reap_stale_staging().await {
            Ok(report) => debug!(
                scanned = report.scanned,
                removed = report.removed,
                "staging sweep"
            ),
            Err(e) => warn!(error = %e, "staging sweep failed"),
        }

        if let Some(tracker) = &self.tracker {
            let purged = tracker.purge_expired().await;
            if purged > 0 {
                debug!(purged, "expired tracker keys dropped");
            }
        }
    }

    /// Sweeps on every tick until `cancel` fires. The first sweep runs immediately.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "staging reaper started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.run_once().await,
            }
        }

        info!("staging reaper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use netdisk_catalog::MemoryCatalog;
    use netdisk_transfer::ProgressTracker;

    const FP: &str = "5d41402abc4b2a76b9719d911017c592";

    fn orchestrator(
        dir: &std::path::Path,
        ttl_secs: u64,
    ) -> (Arc<MemoryProgressTracker>, Arc<UploadOrchestrator>) {
        let tracker = Arc::new(MemoryProgressTracker::new());
        let config = IngestConfig {
            session_ttl_secs: ttl_secs,
            ..IngestConfig::with_upload_dir(dir.join("uploads"))
        };
        let orch = UploadOrchestrator::new(config, tracker.clone(), Arc::new(MemoryCatalog::new()));
        (tracker, Arc::new(orch))
    }

    #[tokio::test]
    async fn run_once_keeps_fresh_sessions() {
        let tmp = tempfile::tempdir().unwrap();
        let (_tracker, orch) = orchestrator(tmp.path(), 3600);
        orch.store_chunk(FP, 0, b"hel").await.unwrap();

        StagingReaper::new(orch.clone()).run_once().await;
        assert!(orch.chunk_store().session_dir(FP).exists());
    }

    #[tokio::test]
    async fn run_once_purges_expired_tracker_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let (tracker, orch) = orchestrator(tmp.path(), 3600);
        tracker
            .set_if_absent("stale", "x", Duration::ZERO)
            .await
            .unwrap();

        StagingReaper::new(orch)
            .with_tracker_purge(tracker.clone())
            .run_once()
            .await;
        assert!(tracker.is_empty().await);
    }

    #[tokio::test]
    async fn run_sweeps_until_cancelled() {
        let tmp = tempfile::tempdir().unwrap();
        let (_tracker, orch) = orchestrator(tmp.path(), 0);
        orch.store_chunk(FP, 0, b"hel").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let cancel = CancellationToken::new();
        let reaper = StagingReaper::new(orch.clone()).with_interval(Duration::from_millis(10));
        let handle = tokio::spawn(reaper.run(cancel.clone()));

        for _ in 0..100 {
            if !orch.chunk_store().session_dir(FP).exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!orch.chunk_store().session_dir(FP).exists());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_reaper_exits_immediately() {
        let tmp = tempfile::tempdir().unwrap();
        let (_tracker, orch) = orchestrator(tmp.path(), 3600);
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(
            Duration::from_secs(5),
            StagingReaper::new(orch).run(cancel),
        )
        .await
        .unwrap();
    }
}
