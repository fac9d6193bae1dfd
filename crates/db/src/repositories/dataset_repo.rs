//! Repository for the `datasets` table.

use sqlx::PgPool;

use crate::models::dataset::{CreateDataset, Dataset};
use crate::repositories::record_repo::COMPLETED_FILTER;

/// Column list for `datasets` queries.
const COLUMNS: &str = "\
    id, name, data_type, client_id, classes, num_of_classes, size_bytes, \
    num_of_records, completion_percent, uploaded_at, modified_at";

/// Provides persistence for datasets.
pub struct DatasetRepo;

impl DatasetRepo {
    /// Insert a dataset, or refresh its metadata when the same id is
    /// ingested again. Identity and derived counters are never overwritten.
    pub async fn upsert(pool: &PgPool, input: &CreateDataset) -> Result<Dataset, sqlx::Error> {
        let query = format!(
            "INSERT INTO datasets \
                 (id, name, data_type, client_id, classes, num_of_classes, size_bytes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, \
                 data_type = EXCLUDED.data_type, \
                 classes = EXCLUDED.classes, \
                 num_of_classes = EXCLUDED.num_of_classes, \
                 size_bytes = EXCLUDED.size_bytes, \
                 modified_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Dataset>(&query)
            .bind(&input.id)
            .bind(&input.name)
            .bind(&input.data_type)
            .bind(&input.client_id)
            .bind(&input.classes)
            .bind(input.num_of_classes)
            .bind(input.size_bytes)
            .fetch_one(pool)
            .await
    }

    /// Find a dataset by its ID.
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Dataset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM datasets WHERE id = $1");
        sqlx::query_as::<_, Dataset>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List every dataset owned by a client, newest first.
    pub async fn list_by_client(
        pool: &PgPool,
        client_id: &str,
    ) -> Result<Vec<Dataset>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM datasets WHERE client_id = $1 ORDER BY uploaded_at DESC, id ASC"
        );
        sqlx::query_as::<_, Dataset>(&query)
            .bind(client_id)
            .fetch_all(pool)
            .await
    }

    /// Recompute `num_of_records` and `completion_percent` from the dataset's
    /// records in a single statement.
    ///
    /// A record counts as completed when its annotation payload is non-null
    /// and not blank (see `COMPLETED_FILTER`). An empty dataset is 0% complete.
    /// Returns `false` if the dataset does not exist.
    pub async fn recompute_completion(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE datasets d SET \
                 num_of_records = agg.total, \
                 completion_percent = CASE WHEN agg.total = 0 THEN 0 \
                     ELSE agg.completed::DOUBLE PRECISION / agg.total * 100 END, \
                 modified_at = NOW() \
             FROM ( \
                 SELECT COUNT(*)::INTEGER AS total, \
                        COUNT(*) FILTER ( \
                            WHERE {COMPLETED_FILTER} \
                        )::INTEGER AS completed \
                 FROM records WHERE dataset_id = $1 \
             ) agg \
             WHERE d.id = $1"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
