//! The upload job handler run by workers.
//!
//! Delivery is at-least-once, so every step tolerates a repeat: `put` is
//! idempotent, and a staging file that is already gone means an earlier
//! delivery got past the upload.

use labelhub_storage::StorageGateway;

use crate::error::PipelineError;
use crate::queue::{ClaimedJob, RetryDecision, UploadJob, UploadQueue};

/// How a delivery was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Staging file sent to storage and removed.
    Uploaded { key: String },
    /// Staging file was already gone and the object exists.
    AlreadyUploaded { key: String },
}

/// Result of one delivery as seen by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Acked(UploadOutcome),
    Retrying,
    Failed,
}

/// Upload one job's staging file to its remote key, then delete it.
///
/// The staging file is only removed after `put` succeeds. On error nothing
/// is deleted and the error is returned for the queue to retry.
pub async fn handle_upload(
    storage: &dyn StorageGateway,
    job: &UploadJob,
) -> Result<UploadOutcome, PipelineError> {
    let key = job.remote_key();
    let staging_path = job.staging_path();

    let staged = tokio::fs::try_exists(staging_path)
        .await
        .map_err(|e| PipelineError::io(staging_path, e))?;

    if !staged {
        let listed = storage.list(&key).await?;
        if listed.iter().any(|object| object.key == key) {
            tracing::debug!(key = %key, "Staging file gone, object already stored");
            return Ok(UploadOutcome::AlreadyUploaded { key });
        }
        return Err(PipelineError::MissingSource {
            path: staging_path.to_path_buf(),
            key,
        });
    }

    storage.put(staging_path, &key).await?;

    match tokio::fs::remove_file(staging_path).await {
        Ok(()) => {}
        // A concurrent redelivery got there first.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(PipelineError::io(staging_path, e)),
    }

    Ok(UploadOutcome::Uploaded { key })
}

/// Run the handler for a claimed job and report the result to the queue.
///
/// Transient failures go back to the queue with backoff; anything else fails
/// the job immediately.
pub async fn process_claimed(
    queue: &dyn UploadQueue,
    storage: &dyn StorageGateway,
    claimed: &ClaimedJob,
) -> Result<Delivery, PipelineError> {
    match handle_upload(storage, &claimed.job).await {
        Ok(outcome) => {
            queue.ack(claimed.id).await?;
            tracing::info!(
                job_id = claimed.id,
                dataset_id = %claimed.job.dataset_id(),
                kind = claimed.job.kind(),
                outcome = ?outcome,
                "Upload job completed"
            );
            Ok(Delivery::Acked(outcome))
        }
        Err(e) if e.is_transient() => {
            let message = e.to_string();
            match queue.nack(claimed, &message).await? {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        job_id = claimed.id,
                        attempt = claimed.attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %message,
                        "Upload failed, will retry"
                    );
                    Ok(Delivery::Retrying)
                }
                RetryDecision::Failed => {
                    tracing::error!(
                        job_id = claimed.id,
                        attempts = claimed.attempts,
                        error = %message,
                        "Upload failed, attempts exhausted"
                    );
                    Ok(Delivery::Failed)
                }
            }
        }
        Err(e) => {
            let message = e.to_string();
            queue.fail(claimed.id, &message).await?;
            tracing::error!(job_id = claimed.id, error = %message, "Upload failed permanently");
            Ok(Delivery::Failed)
        }
    }
}
