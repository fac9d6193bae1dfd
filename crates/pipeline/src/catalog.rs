//! The relational state the pipeline reads and writes, behind [`Catalog`].
//!
//! [`PgCatalog`] delegates to the `labelhub-db` repositories; the in-memory
//! implementation in [`crate::memory`] backs tests.

use std::sync::Arc;

use async_trait::async_trait;
use labelhub_db::models::annotator::{Annotator, AnnotatorDatasetLink};
use labelhub_db::models::dataset::{CreateDataset, Dataset};
use labelhub_db::models::record::{CreateRecord, Record, RecordAnnotation, UpdateRecord};
use labelhub_db::repositories::{AnnotatorRepo, CursorRepo, DatasetRepo, RecordRepo};
use labelhub_db::DbPool;

use crate::error::PipelineError;

#[async_trait]
pub trait Catalog: Send + Sync {
    /// Cheap reachability probe for health endpoints.
    async fn health_check(&self) -> Result<(), PipelineError>;

    /// Insert or refresh a dataset.
    async fn insert_dataset(&self, input: &CreateDataset) -> Result<Dataset, PipelineError>;

    async fn find_dataset(&self, dataset_id: &str) -> Result<Option<Dataset>, PipelineError>;

    async fn datasets_for_client(&self, client_id: &str) -> Result<Vec<Dataset>, PipelineError>;

    /// Insert a batch of records. Existing records keep their annotator.
    async fn insert_records(&self, records: &[CreateRecord]) -> Result<u64, PipelineError>;

    /// Partial update; `false` when the record does not exist.
    async fn update_record_fields(
        &self,
        dataset_id: &str,
        record_id: &str,
        input: &UpdateRecord,
    ) -> Result<bool, PipelineError>;

    async fn find_record(
        &self,
        dataset_id: &str,
        record_id: &str,
    ) -> Result<Option<Record>, PipelineError>;

    /// All records of a dataset in insertion order.
    async fn records_by_dataset(&self, dataset_id: &str) -> Result<Vec<Record>, PipelineError>;

    /// One annotator's records of a dataset in insertion order.
    async fn records_by_annotator(
        &self,
        dataset_id: &str,
        annotator_id: &str,
    ) -> Result<Vec<Record>, PipelineError>;

    async fn record_annotations(
        &self,
        dataset_id: &str,
    ) -> Result<Vec<RecordAnnotation>, PipelineError>;

    /// The ordered list round-robin assignment walks.
    async fn active_annotators(&self) -> Result<Vec<Annotator>, PipelineError>;

    async fn load_cursor(&self) -> Result<u64, PipelineError>;

    async fn store_cursor(&self, position: u64) -> Result<(), PipelineError>;

    /// Recompute `assigned_records` of every annotator link in a dataset.
    async fn upsert_annotator_links(&self, dataset_id: &str) -> Result<(), PipelineError>;

    /// Recompute one link's counters; returns the completed count.
    async fn recompute_annotator_completion(
        &self,
        annotator_id: &str,
        dataset_id: &str,
    ) -> Result<i32, PipelineError>;

    async fn annotator_links(
        &self,
        annotator_id: &str,
    ) -> Result<Vec<AnnotatorDatasetLink>, PipelineError>;

    /// Recompute the record count and completion percentage of a dataset;
    /// `false` when the dataset does not exist.
    async fn recompute_dataset_completion(&self, dataset_id: &str) -> Result<bool, PipelineError>;
}

/// Shared handle used by services and HTTP state.
pub type SharedCatalog = Arc<dyn Catalog>;

/// [`Catalog`] over Postgres.
#[derive(Clone)]
pub struct PgCatalog {
    pool: DbPool,
}

impl PgCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn health_check(&self) -> Result<(), PipelineError> {
        Ok(labelhub_db::health_check(&self.pool).await?)
    }

    async fn insert_dataset(&self, input: &CreateDataset) -> Result<Dataset, PipelineError> {
        Ok(DatasetRepo::upsert(&self.pool, input).await?)
    }

    async fn find_dataset(&self, dataset_id: &str) -> Result<Option<Dataset>, PipelineError> {
        Ok(DatasetRepo::find_by_id(&self.pool, dataset_id).await?)
    }

    async fn datasets_for_client(&self, client_id: &str) -> Result<Vec<Dataset>, PipelineError> {
        Ok(DatasetRepo::list_by_client(&self.pool, client_id).await?)
    }

    async fn insert_records(&self, records: &[CreateRecord]) -> Result<u64, PipelineError> {
        Ok(RecordRepo::upsert_many(&self.pool, records).await?)
    }

    async fn update_record_fields(
        &self,
        dataset_id: &str,
        record_id: &str,
        input: &UpdateRecord,
    ) -> Result<bool, PipelineError> {
        Ok(RecordRepo::update_fields(&self.pool, dataset_id, record_id, input).await?)
    }

    async fn find_record(
        &self,
        dataset_id: &str,
        record_id: &str,
    ) -> Result<Option<Record>, PipelineError> {
        Ok(RecordRepo::find(&self.pool, dataset_id, record_id).await?)
    }

    async fn records_by_dataset(&self, dataset_id: &str) -> Result<Vec<Record>, PipelineError> {
        Ok(RecordRepo::list_by_dataset(&self.pool, dataset_id).await?)
    }

    async fn records_by_annotator(
        &self,
        dataset_id: &str,
        annotator_id: &str,
    ) -> Result<Vec<Record>, PipelineError> {
        Ok(RecordRepo::list_by_annotator(&self.pool, dataset_id, annotator_id).await?)
    }

    async fn record_annotations(
        &self,
        dataset_id: &str,
    ) -> Result<Vec<RecordAnnotation>, PipelineError> {
        Ok(RecordRepo::list_annotations(&self.pool, dataset_id).await?)
    }

    async fn active_annotators(&self) -> Result<Vec<Annotator>, PipelineError> {
        Ok(AnnotatorRepo::list_active(&self.pool).await?)
    }

    async fn load_cursor(&self) -> Result<u64, PipelineError> {
        let position = CursorRepo::load(&self.pool).await?;
        Ok(position.max(0) as u64)
    }

    async fn store_cursor(&self, position: u64) -> Result<(), PipelineError> {
        let position = i64::try_from(position).unwrap_or(i64::MAX);
        Ok(CursorRepo::store(&self.pool, position).await?)
    }

    async fn upsert_annotator_links(&self, dataset_id: &str) -> Result<(), PipelineError> {
        AnnotatorRepo::recompute_assigned(&self.pool, dataset_id).await?;
        Ok(())
    }

    async fn recompute_annotator_completion(
        &self,
        annotator_id: &str,
        dataset_id: &str,
    ) -> Result<i32, PipelineError> {
        Ok(AnnotatorRepo::recompute_completed(&self.pool, annotator_id, dataset_id).await?)
    }

    async fn annotator_links(
        &self,
        annotator_id: &str,
    ) -> Result<Vec<AnnotatorDatasetLink>, PipelineError> {
        Ok(AnnotatorRepo::list_links_for_annotator(&self.pool, annotator_id).await?)
    }

    async fn recompute_dataset_completion(&self, dataset_id: &str) -> Result<bool, PipelineError> {
        Ok(DatasetRepo::recompute_completion(&self.pool, dataset_id).await?)
    }
}
