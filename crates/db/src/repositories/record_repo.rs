//! Repository for the `records` table.

use sqlx::PgPool;

use crate::models::record::{CreateRecord, Record, RecordAnnotation, UpdateRecord};

/// Column list for `records` queries.
const COLUMNS: &str = "\
    dataset_id, id, seq, name, annotator_id, annotations, in_use, created_at, updated_at";

/// SQL predicate for a completed record: a payload with at least one
/// character outside Unicode whitespace and the byte order mark. Must agree
/// with `labelhub_core::completion::is_completed`.
pub(crate) const COMPLETED_FILTER: &str = r"annotations IS NOT NULL AND annotations !~ '^[\t\n\v\f\r \u0085\u00a0\u1680\u2000-\u200a\u2028\u2029\u202f\u205f\u3000\ufeff]*$'";

/// Provides persistence for records.
pub struct RecordRepo;

impl RecordRepo {
    /// Insert a batch of records in one transaction.
    ///
    /// Re-ingesting an existing record refreshes its name but keeps the
    /// annotator it was originally assigned (assignment happens once).
    pub async fn upsert_many(pool: &PgPool, records: &[CreateRecord]) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut affected = 0;
        for record in records {
            let result = sqlx::query(
                "INSERT INTO records (dataset_id, id, name, annotator_id) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (dataset_id, id) DO UPDATE SET \
                     name = EXCLUDED.name, \
                     annotator_id = COALESCE(records.annotator_id, EXCLUDED.annotator_id), \
                     updated_at = NOW()",
            )
            .bind(&record.dataset_id)
            .bind(&record.id)
            .bind(&record.name)
            .bind(&record.annotator_id)
            .execute(&mut *tx)
            .await?;
            affected += result.rows_affected();
        }
        tx.commit().await?;
        Ok(affected)
    }

    /// Apply a partial update. Returns `false` if the record does not exist.
    pub async fn update_fields(
        pool: &PgPool,
        dataset_id: &str,
        id: &str,
        input: &UpdateRecord,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE records SET \
                 annotations = CASE WHEN $3 THEN $4 ELSE annotations END, \
                 in_use = COALESCE($5, in_use), \
                 updated_at = NOW() \
             WHERE dataset_id = $1 AND id = $2",
        )
        .bind(dataset_id)
        .bind(id)
        .bind(input.annotations.is_some())
        .bind(&input.annotations)
        .bind(input.in_use)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find one record.
    pub async fn find(
        pool: &PgPool,
        dataset_id: &str,
        id: &str,
    ) -> Result<Option<Record>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM records WHERE dataset_id = $1 AND id = $2");
        sqlx::query_as::<_, Record>(&query)
            .bind(dataset_id)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all records of a dataset in insertion order.
    pub async fn list_by_dataset(
        pool: &PgPool,
        dataset_id: &str,
    ) -> Result<Vec<Record>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM records WHERE dataset_id = $1 ORDER BY seq ASC");
        sqlx::query_as::<_, Record>(&query)
            .bind(dataset_id)
            .fetch_all(pool)
            .await
    }

    /// List the records of a dataset assigned to one annotator, in insertion
    /// order.
    pub async fn list_by_annotator(
        pool: &PgPool,
        dataset_id: &str,
        annotator_id: &str,
    ) -> Result<Vec<Record>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM records \
             WHERE dataset_id = $1 AND annotator_id = $2 \
             ORDER BY seq ASC"
        );
        sqlx::query_as::<_, Record>(&query)
            .bind(dataset_id)
            .bind(annotator_id)
            .fetch_all(pool)
            .await
    }

    /// Export the annotation payload of every record in a dataset.
    pub async fn list_annotations(
        pool: &PgPool,
        dataset_id: &str,
    ) -> Result<Vec<RecordAnnotation>, sqlx::Error> {
        sqlx::query_as::<_, RecordAnnotation>(
            "SELECT id, annotations FROM records WHERE dataset_id = $1 ORDER BY seq ASC",
        )
        .bind(dataset_id)
        .fetch_all(pool)
        .await
    }
}
