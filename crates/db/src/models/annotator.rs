//! Annotator and annotator-dataset link models.

use labelhub_core::types::{AnnotatorId, DatasetId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `annotators` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Annotator {
    pub id: AnnotatorId,
    pub name: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}

/// DTO for registering an annotator.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAnnotator {
    pub id: AnnotatorId,
    pub name: String,
}

/// A row from the `annotator_datasets` table.
///
/// Both counters are recomputed from `records`, never incremented.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnnotatorDatasetLink {
    pub annotator_id: AnnotatorId,
    pub dataset_id: DatasetId,
    pub assigned_records: i32,
    pub completed_records: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
