//! Wires the ingest components together and runs until Ctrl-C.

use std::sync::Arc;

use netdisk_catalog::MemoryCatalog;
use netdisk_ingest::{StagingReaper, UploadOrchestrator};
use netdisk_transfer::MemoryProgressTracker;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Builds the orchestrator, prepares storage and starts the staging reaper.
pub async fn start(
    config: &Config,
    cancel: CancellationToken,
) -> anyhow::Result<(Arc<UploadOrchestrator>, tokio::task::JoinHandle<()>)> {
    let tracker = Arc::new(MemoryProgressTracker::new());
    let catalog = Arc::new(MemoryCatalog::new());
    let orchestrator = Arc::new(UploadOrchestrator::new(
        config.ingest.clone(),
        tracker.clone(),
        catalog,
    ));
    orchestrator.prepare().await?;

    let reaper = StagingReaper::new(Arc::clone(&orchestrator)).with_tracker_purge(tracker);
    let reaper_task = tokio::spawn(reaper.run(cancel));

    Ok((orchestrator, reaper_task))
}

/// Runs the service until shutdown is requested.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let (orchestrator, reaper_task) = start(&config, cancel.clone()).await?;

    tracing::info!(
        upload_dir = %orchestrator.blob_store().root().display(),
        staging_dir = %orchestrator.chunk_store().root().display(),
        fingerprint = ?orchestrator.config().fingerprint,
        "ingest service ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    cancel.cancel();
    if let Err(e) = reaper_task.await {
        tracing::error!("reaper task failed: {e}");
    }
    Ok(())
}
