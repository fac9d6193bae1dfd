//! Repository for the `upload_jobs` table: a durable at-least-once queue.
//!
//! Jobs move `pending -> running -> completed`. A failed delivery returns the
//! job to `pending` with a later `run_after` until `max_attempts` is reached,
//! after which it stays `failed` for operators to inspect.

use std::time::Duration;

use labelhub_core::types::JobId;
use sqlx::PgPool;

use crate::models::status::UploadJobStatus;
use crate::models::upload_job::{NewUploadJob, UploadJobCount, UploadJobRow};

/// Column list for `upload_jobs` queries.
const COLUMNS: &str = "\
    id, kind, dataset_id, payload, status_id, attempts, max_attempts, run_after, \
    claimed_by, claimed_at, completed_at, last_error, created_at, updated_at";

/// Provides queue operations over upload jobs.
pub struct UploadJobRepo;

impl UploadJobRepo {
    /// Durably record a new pending job.
    pub async fn enqueue(pool: &PgPool, input: &NewUploadJob) -> Result<UploadJobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO upload_jobs (kind, dataset_id, payload, status_id, max_attempts) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UploadJobRow>(&query)
            .bind(&input.kind)
            .bind(&input.dataset_id)
            .bind(&input.payload)
            .bind(UploadJobStatus::Pending.id())
            .bind(input.max_attempts)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the oldest due pending job for a worker.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so each job is delivered to one
    /// worker at a time. Claiming counts as a delivery attempt.
    pub async fn claim_next(
        pool: &PgPool,
        worker_id: &str,
    ) -> Result<Option<UploadJobRow>, sqlx::Error> {
        let query = format!(
            "UPDATE upload_jobs \
             SET status_id = $2, claimed_by = $1, claimed_at = NOW(), \
                 attempts = attempts + 1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM upload_jobs \
                 WHERE status_id = $3 AND run_after <= NOW() \
                 ORDER BY run_after ASC, id ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UploadJobRow>(&query)
            .bind(worker_id)
            .bind(UploadJobStatus::Running.id())
            .bind(UploadJobStatus::Pending.id())
            .fetch_optional(pool)
            .await
    }

    /// Acknowledge a job as completed.
    pub async fn complete(pool: &PgPool, id: JobId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE upload_jobs \
             SET status_id = $2, completed_at = NOW(), last_error = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(UploadJobStatus::Completed.id())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Return a job to the queue after a failed delivery, due again after
    /// `delay`.
    pub async fn release_for_retry(
        pool: &PgPool,
        id: JobId,
        error: &str,
        delay: Duration,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE upload_jobs \
             SET status_id = $2, last_error = $3, \
                 run_after = NOW() + make_interval(secs => $4), \
                 claimed_by = NULL, claimed_at = NULL, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(UploadJobStatus::Pending.id())
        .bind(error)
        .bind(delay.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark a job permanently failed.
    pub async fn fail(pool: &PgPool, id: JobId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE upload_jobs \
             SET status_id = $2, last_error = $3, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(UploadJobStatus::Failed.id())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Return jobs whose claim is older than `visibility_timeout` to the
    /// queue (the worker holding them is presumed dead). Jobs that already
    /// used every attempt are marked failed instead. Returns the number of
    /// jobs touched.
    pub async fn requeue_stale(
        pool: &PgPool,
        visibility_timeout: Duration,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE upload_jobs \
             SET status_id = CASE WHEN attempts >= max_attempts THEN $3 ELSE $2 END, \
                 last_error = COALESCE(last_error, 'claim expired'), \
                 completed_at = CASE WHEN attempts >= max_attempts THEN NOW() ELSE NULL END, \
                 claimed_by = NULL, claimed_at = NULL, updated_at = NOW() \
             WHERE status_id = $1 \
               AND claimed_at < NOW() - make_interval(secs => $4)",
        )
        .bind(UploadJobStatus::Running.id())
        .bind(UploadJobStatus::Pending.id())
        .bind(UploadJobStatus::Failed.id())
        .bind(visibility_timeout.as_secs_f64())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: JobId) -> Result<Option<UploadJobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM upload_jobs WHERE id = $1");
        sqlx::query_as::<_, UploadJobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Count a dataset's jobs per status.
    pub async fn count_by_status(
        pool: &PgPool,
        dataset_id: &str,
    ) -> Result<Vec<UploadJobCount>, sqlx::Error> {
        sqlx::query_as::<_, UploadJobCount>(
            "SELECT status_id, COUNT(*) AS count FROM upload_jobs \
             WHERE dataset_id = $1 GROUP BY status_id ORDER BY status_id",
        )
        .bind(dataset_id)
        .fetch_all(pool)
        .await
    }
}
