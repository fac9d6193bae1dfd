//! Periodic return of abandoned claims to the upload queue.
//!
//! A worker that dies after claiming a job never acknowledges it. Once the
//! claim is older than the visibility timeout the job is made pending again
//! (or failed, if it has used every attempt).

use std::time::Duration;

use labelhub_pipeline::SharedQueue;
use tokio_util::sync::CancellationToken;

/// Sweep at a fraction of the visibility timeout so abandoned jobs are picked
/// up promptly after they expire.
pub fn sweep_interval(visibility_timeout: Duration) -> Duration {
    (visibility_timeout / 4).clamp(Duration::from_secs(1), Duration::from_secs(60))
}

/// Run the reaper loop until `cancel` fires.
pub async fn run(queue: SharedQueue, visibility_timeout: Duration, cancel: CancellationToken) {
    let every = sweep_interval(visibility_timeout);
    tracing::info!(
        visibility_timeout_secs = visibility_timeout.as_secs(),
        interval_secs = every.as_secs(),
        "Upload reaper started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Upload reaper stopping");
                break;
            }
            _ = interval.tick() => {
                match queue.requeue_stale(visibility_timeout).await {
                    Ok(0) => tracing::debug!("Upload reaper: no stale claims"),
                    Ok(requeued) => tracing::warn!(requeued, "Upload reaper: returned stale claims"),
                    Err(e) => tracing::error!(error = %e, "Upload reaper: sweep failed"),
                }
            }
        }
    }
}
