//! Record entity model and DTOs.

use labelhub_core::types::{AnnotatorId, DatasetId, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `records` table.
///
/// `seq` preserves insertion order; listings are ordered by it.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Record {
    pub dataset_id: DatasetId,
    pub id: RecordId,
    pub seq: i64,
    pub name: String,
    pub annotator_id: Option<AnnotatorId>,
    pub annotations: Option<String>,
    pub in_use: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a record during ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecord {
    pub dataset_id: DatasetId,
    pub id: RecordId,
    pub name: String,
    pub annotator_id: Option<AnnotatorId>,
}

/// Partial update of a record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRecord {
    pub annotations: Option<String>,
    pub in_use: Option<bool>,
}

/// The annotation payload of one record, for export.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecordAnnotation {
    pub id: RecordId,
    pub annotations: Option<String>,
}
