//! Upload jobs and the durable at-least-once queue that carries them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use labelhub_core::error::CoreError;
use labelhub_core::object_key;
use labelhub_core::retry::{backoff_delay, should_retry, with_jitter};
use labelhub_core::types::JobId;
use labelhub_db::models::status::UploadJobStatus;
use labelhub_db::models::upload_job::{NewUploadJob, UploadJobRow, KIND_CHUNK, KIND_WHOLE_FILE};
use labelhub_db::repositories::UploadJobRepo;
use labelhub_db::DbPool;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Upload of one chunk of a large file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkUploadJob {
    pub dataset_id: String,
    /// Original name of the file the chunk was cut from.
    pub file_name: String,
    pub chunk_index: u32,
    pub staging_path: PathBuf,
}

/// Upload of a file small enough to send in one piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WholeFileUploadJob {
    pub dataset_id: String,
    pub record_id: String,
    pub file_name: String,
    pub staging_path: PathBuf,
}

/// A queued upload. A pure function of (staging path, remote key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadJob {
    Chunk(ChunkUploadJob),
    WholeFile(WholeFileUploadJob),
}

impl UploadJob {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chunk(_) => KIND_CHUNK,
            Self::WholeFile(_) => KIND_WHOLE_FILE,
        }
    }

    pub fn dataset_id(&self) -> &str {
        match self {
            Self::Chunk(job) => &job.dataset_id,
            Self::WholeFile(job) => &job.dataset_id,
        }
    }

    pub fn staging_path(&self) -> &Path {
        match self {
            Self::Chunk(job) => &job.staging_path,
            Self::WholeFile(job) => &job.staging_path,
        }
    }

    /// Destination key, derived only from the job's fields.
    pub fn remote_key(&self) -> String {
        match self {
            Self::Chunk(job) => {
                object_key::chunk_key(&job.dataset_id, &job.file_name, job.chunk_index)
            }
            Self::WholeFile(job) => {
                object_key::whole_file_key(&job.dataset_id, &job.record_id, &job.file_name)
            }
        }
    }
}

/// A job handed to one worker.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: JobId,
    /// Deliveries so far, including this one.
    pub attempts: i32,
    pub max_attempts: i32,
    pub job: UploadJob,
}

/// What happened to a job after a failed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back in the queue, due again after the delay.
    Retry(Duration),
    /// Out of attempts; kept as failed.
    Failed,
}

/// Decide whether a failed delivery is retried, and after how long.
pub fn retry_decision(attempts: i32, max_attempts: i32) -> RetryDecision {
    if should_retry(attempts, max_attempts) {
        RetryDecision::Retry(with_jitter(backoff_delay(attempts.max(1) as u32)))
    } else {
        RetryDecision::Failed
    }
}

/// Per-status job counts for one dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
}

impl UploadProgress {
    /// Add `count` jobs in `status`.
    pub fn add(&mut self, status: UploadJobStatus, count: u64) {
        match status {
            UploadJobStatus::Pending => self.pending += count,
            UploadJobStatus::Running => self.running += count,
            UploadJobStatus::Completed => self.completed += count,
            UploadJobStatus::Failed => self.failed += count,
        }
    }

    /// No job is waiting or in flight.
    pub fn is_settled(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}

#[async_trait]
pub trait UploadQueue: Send + Sync {
    /// Durably record a job. Returns once it is persisted; never waits for
    /// the upload.
    async fn enqueue(&self, job: &UploadJob) -> Result<JobId, PipelineError>;

    /// Claim the next due job, if any. A job is held by one worker at a time.
    async fn claim(&self, worker_id: &str) -> Result<Option<ClaimedJob>, PipelineError>;

    /// Acknowledge a successful delivery.
    async fn ack(&self, id: JobId) -> Result<(), PipelineError>;

    /// Report a failed delivery; the queue retries with backoff or gives up.
    async fn nack(&self, job: &ClaimedJob, error: &str) -> Result<RetryDecision, PipelineError>;

    /// Fail a job without further retries.
    async fn fail(&self, id: JobId, error: &str) -> Result<(), PipelineError>;

    /// Return claims older than `visibility_timeout` to the queue.
    async fn requeue_stale(&self, visibility_timeout: Duration) -> Result<u64, PipelineError>;

    /// Job counts for one dataset, by status.
    async fn progress(&self, dataset_id: &str) -> Result<UploadProgress, PipelineError>;
}

pub type SharedQueue = Arc<dyn UploadQueue>;

/// [`UploadQueue`] over the `upload_jobs` table.
#[derive(Clone)]
pub struct PgUploadQueue {
    pool: DbPool,
    max_attempts: i32,
}

impl PgUploadQueue {
    pub fn new(pool: DbPool, max_attempts: i32) -> Self {
        Self { pool, max_attempts }
    }
}

fn decode(row: UploadJobRow) -> Result<ClaimedJob, PipelineError> {
    let job: UploadJob =
        serde_json::from_value(row.payload).map_err(|e| PipelineError::MalformedJob {
            id: row.id,
            reason: e.to_string(),
        })?;
    if job.kind() != row.kind {
        return Err(PipelineError::MalformedJob {
            id: row.id,
            reason: format!("kind column '{}' does not match payload '{}'", row.kind, job.kind()),
        });
    }
    Ok(ClaimedJob {
        id: row.id,
        attempts: row.attempts,
        max_attempts: row.max_attempts,
        job,
    })
}

#[async_trait]
impl UploadQueue for PgUploadQueue {
    async fn enqueue(&self, job: &UploadJob) -> Result<JobId, PipelineError> {
        let payload = serde_json::to_value(job)
            .map_err(|e| CoreError::Internal(format!("Failed to encode upload job: {e}")))?;
        let input = NewUploadJob {
            kind: job.kind().to_string(),
            dataset_id: job.dataset_id().to_string(),
            payload,
            max_attempts: self.max_attempts,
        };
        let row = UploadJobRepo::enqueue(&self.pool, &input).await?;
        Ok(row.id)
    }

    async fn claim(&self, worker_id: &str) -> Result<Option<ClaimedJob>, PipelineError> {
        let Some(row) = UploadJobRepo::claim_next(&self.pool, worker_id).await? else {
            return Ok(None);
        };
        let id = row.id;
        match decode(row) {
            Ok(claimed) => Ok(Some(claimed)),
            Err(e) => {
                // Unreadable payloads can never succeed.
                UploadJobRepo::fail(&self.pool, id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn ack(&self, id: JobId) -> Result<(), PipelineError> {
        Ok(UploadJobRepo::complete(&self.pool, id).await?)
    }

    async fn nack(&self, job: &ClaimedJob, error: &str) -> Result<RetryDecision, PipelineError> {
        let decision = retry_decision(job.attempts, job.max_attempts);
        match decision {
            RetryDecision::Retry(delay) => {
                UploadJobRepo::release_for_retry(&self.pool, job.id, error, delay).await?
            }
            RetryDecision::Failed => UploadJobRepo::fail(&self.pool, job.id, error).await?,
        }
        Ok(decision)
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<(), PipelineError> {
        Ok(UploadJobRepo::fail(&self.pool, id, error).await?)
    }

    async fn requeue_stale(&self, visibility_timeout: Duration) -> Result<u64, PipelineError> {
        Ok(UploadJobRepo::requeue_stale(&self.pool, visibility_timeout).await?)
    }

    async fn progress(&self, dataset_id: &str) -> Result<UploadProgress, PipelineError> {
        let mut progress = UploadProgress::default();
        for row in UploadJobRepo::count_by_status(&self.pool, dataset_id).await? {
            match UploadJobStatus::from_id(row.status_id) {
                Some(status) => progress.add(status, row.count.max(0) as u64),
                None => tracing::warn!(status_id = row.status_id, "Unknown upload job status"),
            }
        }
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_job() -> UploadJob {
        UploadJob::Chunk(ChunkUploadJob {
            dataset_id: "ds1".into(),
            file_name: "scan.tiff".into(),
            chunk_index: 2,
            staging_path: "/staging/ds1-scan-chunk-2.tiff".into(),
        })
    }

    #[test]
    fn remote_keys_follow_key_scheme() {
        assert_eq!(chunk_job().remote_key(), "uploads/ds1/scan-chunk-2.tiff");

        let whole = UploadJob::WholeFile(WholeFileUploadJob {
            dataset_id: "ds1".into(),
            record_id: "abc123".into(),
            file_name: "cat.png".into(),
            staging_path: "/staging/ds1-abc123.png".into(),
        });
        assert_eq!(whole.remote_key(), "uploads/ds1/abc123.png");
        assert_eq!(whole.kind(), KIND_WHOLE_FILE);
    }

    #[test]
    fn progress_settles_once_nothing_is_in_flight() {
        let mut progress = UploadProgress::default();
        progress.add(UploadJobStatus::Completed, 3);
        progress.add(UploadJobStatus::Failed, 1);
        assert!(progress.is_settled());

        progress.add(UploadJobStatus::Running, 1);
        assert!(!progress.is_settled());
        assert_eq!(progress.running, 1);
    }

    #[test]
    fn payload_carries_kind_tag() {
        let value = serde_json::to_value(chunk_job()).unwrap();
        assert_eq!(value["kind"], "chunk");
        assert_eq!(value["chunk_index"], 2);
    }

    #[test]
    fn decode_rejects_mismatched_kind() {
        let now = chrono::Utc::now();
        let row = UploadJobRow {
            id: 7,
            kind: KIND_WHOLE_FILE.to_string(),
            dataset_id: "ds1".into(),
            payload: serde_json::to_value(chunk_job()).unwrap(),
            status_id: 2,
            attempts: 1,
            max_attempts: 5,
            run_after: now,
            claimed_by: Some("w1".into()),
            claimed_at: Some(now),
            completed_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        let err = decode(row).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedJob { id: 7, .. }));
    }

    #[test]
    fn retry_until_attempts_exhausted() {
        assert!(matches!(retry_decision(1, 3), RetryDecision::Retry(_)));
        assert!(matches!(retry_decision(2, 3), RetryDecision::Retry(_)));
        assert_eq!(retry_decision(3, 3), RetryDecision::Failed);
    }

    #[test]
    fn retry_delay_grows_with_attempts() {
        let RetryDecision::Retry(first) = retry_decision(1, 10) else {
            panic!("expected retry");
        };
        let RetryDecision::Retry(third) = retry_decision(3, 10) else {
            panic!("expected retry");
        };
        assert!(first >= Duration::from_secs(2));
        assert!(third >= Duration::from_secs(8));
    }
}
