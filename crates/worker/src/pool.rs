//! The claim, upload and acknowledge loop.

use std::sync::Arc;
use std::time::Duration;

use labelhub_pipeline::upload::{process_claimed, Delivery};
use labelhub_pipeline::{PipelineError, SharedQueue};
use labelhub_storage::SharedStorage;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Claim and process at most one job. Returns `None` when nothing is due.
pub async fn process_next(
    worker_id: &str,
    queue: &SharedQueue,
    storage: &SharedStorage,
) -> Result<Option<Delivery>, PipelineError> {
    let Some(claimed) = queue.claim(worker_id).await? else {
        return Ok(None);
    };
    tracing::debug!(
        worker_id,
        job_id = claimed.id,
        attempt = claimed.attempts,
        key = %claimed.job.remote_key(),
        "Claimed upload job"
    );
    let delivery = process_claimed(queue.as_ref(), storage.as_ref(), &claimed).await?;
    Ok(Some(delivery))
}

/// Run one worker until `cancel` fires.
///
/// Jobs are processed back to back while the queue has work; an empty queue
/// or a queue error sleeps for `poll_interval`. Cancellation is only
/// observed between jobs, so an in-flight upload always finishes.
pub async fn run_worker(
    worker_id: String,
    queue: SharedQueue,
    storage: SharedStorage,
    poll_interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(worker_id = %worker_id, "Upload worker started");

    while !cancel.is_cancelled() {
        match process_next(&worker_id, &queue, &storage).await {
            Ok(Some(_)) => continue,
            Ok(None) => {}
            Err(e) => {
                tracing::error!(worker_id = %worker_id, error = %e, "Failed to process upload job");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    tracing::info!(worker_id = %worker_id, "Upload worker stopping");
}

/// Handles to a running set of workers.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl WorkerPool {
    /// Signal every worker to stop and wait for in-flight jobs to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Upload worker task panicked");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Spawn `concurrency` workers sharing one queue and storage gateway.
///
/// Worker ids are `{instance_id}-{n}` so claims can be traced back to a
/// process.
pub fn spawn_workers(
    instance_id: &str,
    concurrency: usize,
    queue: SharedQueue,
    storage: SharedStorage,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> WorkerPool {
    let handles = (0..concurrency)
        .map(|n| {
            tokio::spawn(run_worker(
                format!("{instance_id}-{n}"),
                Arc::clone(&queue),
                Arc::clone(&storage),
                poll_interval,
                cancel.clone(),
            ))
        })
        .collect();
    WorkerPool { handles, cancel }
}
