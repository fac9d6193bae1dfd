//! Upload job models for the durable upload queue.

use labelhub_core::types::{DatasetId, JobId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::status::StatusId;

/// Job kind for a single chunk of a large file.
pub const KIND_CHUNK: &str = "chunk";

/// Job kind for a file uploaded in one piece.
pub const KIND_WHOLE_FILE: &str = "whole_file";

/// A row from the `upload_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UploadJobRow {
    pub id: JobId,
    pub kind: String,
    pub dataset_id: DatasetId,
    pub payload: serde_json::Value,
    pub status_id: StatusId,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_after: Timestamp,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for enqueueing a job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUploadJob {
    pub kind: String,
    pub dataset_id: DatasetId,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
}

/// Per-status job counts for one dataset.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UploadJobCount {
    pub status_id: StatusId,
    pub count: i64,
}
