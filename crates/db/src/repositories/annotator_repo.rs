//! Repository for the `annotators` and `annotator_datasets` tables.

use sqlx::PgPool;

use crate::models::annotator::{Annotator, AnnotatorDatasetLink, CreateAnnotator};
use crate::repositories::record_repo::COMPLETED_FILTER;

/// Column list for `annotators` queries.
const COLUMNS: &str = "id, name, is_active, created_at";

/// Column list for `annotator_datasets` queries.
const LINK_COLUMNS: &str = "\
    annotator_id, dataset_id, assigned_records, completed_records, created_at, updated_at";

/// Provides persistence for annotators and their per-dataset counters.
pub struct AnnotatorRepo;

impl AnnotatorRepo {
    /// Register an annotator (or reactivate an existing one).
    pub async fn create(pool: &PgPool, input: &CreateAnnotator) -> Result<Annotator, sqlx::Error> {
        let query = format!(
            "INSERT INTO annotators (id, name) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, is_active = TRUE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Annotator>(&query)
            .bind(&input.id)
            .bind(&input.name)
            .fetch_one(pool)
            .await
    }

    /// Deactivate an annotator. They keep existing assignments but receive
    /// no new records.
    pub async fn deactivate(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE annotators SET is_active = FALSE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// The ordered active-annotator list used for round-robin assignment.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Annotator>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM annotators WHERE is_active ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, Annotator>(&query).fetch_all(pool).await
    }

    /// Recompute `assigned_records` for every annotator holding records in
    /// the dataset, creating link rows as needed.
    pub async fn recompute_assigned(pool: &PgPool, dataset_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO annotator_datasets (annotator_id, dataset_id, assigned_records) \
             SELECT annotator_id, dataset_id, COUNT(*)::INTEGER \
             FROM records \
             WHERE dataset_id = $1 AND annotator_id IS NOT NULL \
             GROUP BY annotator_id, dataset_id \
             ON CONFLICT (annotator_id, dataset_id) DO UPDATE SET \
                 assigned_records = EXCLUDED.assigned_records, \
                 updated_at = NOW()",
        )
        .bind(dataset_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Recompute `completed_records` for one (annotator, dataset) pair from
    /// the non-blank annotations among that annotator's records. Returns the
    /// new count.
    pub async fn recompute_completed(
        pool: &PgPool,
        annotator_id: &str,
        dataset_id: &str,
    ) -> Result<i32, sqlx::Error> {
        let query = format!(
            "INSERT INTO annotator_datasets \
                 (annotator_id, dataset_id, assigned_records, completed_records) \
             SELECT $1, $2, \
                    COUNT(*)::INTEGER, \
                    COUNT(*) FILTER ( \
                        WHERE {COMPLETED_FILTER} \
                    )::INTEGER \
             FROM records \
             WHERE dataset_id = $2 AND annotator_id = $1 \
             ON CONFLICT (annotator_id, dataset_id) DO UPDATE SET \
                 assigned_records = EXCLUDED.assigned_records, \
                 completed_records = EXCLUDED.completed_records, \
                 updated_at = NOW() \
             RETURNING {LINK_COLUMNS}"
        );
        let link = sqlx::query_as::<_, AnnotatorDatasetLink>(&query)
            .bind(annotator_id)
            .bind(dataset_id)
            .fetch_one(pool)
            .await?;
        Ok(link.completed_records)
    }

    /// Find the link row for one (annotator, dataset) pair.
    pub async fn find_link(
        pool: &PgPool,
        annotator_id: &str,
        dataset_id: &str,
    ) -> Result<Option<AnnotatorDatasetLink>, sqlx::Error> {
        let query = format!(
            "SELECT {LINK_COLUMNS} FROM annotator_datasets \
             WHERE annotator_id = $1 AND dataset_id = $2"
        );
        sqlx::query_as::<_, AnnotatorDatasetLink>(&query)
            .bind(annotator_id)
            .bind(dataset_id)
            .fetch_optional(pool)
            .await
    }

    /// List every dataset link of an annotator.
    pub async fn list_links_for_annotator(
        pool: &PgPool,
        annotator_id: &str,
    ) -> Result<Vec<AnnotatorDatasetLink>, sqlx::Error> {
        let query = format!(
            "SELECT {LINK_COLUMNS} FROM annotator_datasets \
             WHERE annotator_id = $1 ORDER BY created_at ASC, dataset_id ASC"
        );
        sqlx::query_as::<_, AnnotatorDatasetLink>(&query)
            .bind(annotator_id)
            .fetch_all(pool)
            .await
    }
}
