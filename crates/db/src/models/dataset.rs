//! Dataset entity model and DTOs.

use labelhub_core::types::{DatasetId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `datasets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub data_type: String,
    pub client_id: String,
    pub classes: Option<String>,
    pub num_of_classes: i32,
    pub size_bytes: i64,
    pub num_of_records: i32,
    pub completion_percent: f64,
    pub uploaded_at: Timestamp,
    pub modified_at: Timestamp,
}

/// DTO for creating (or re-ingesting) a dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDataset {
    pub id: DatasetId,
    pub name: String,
    pub data_type: String,
    pub client_id: String,
    pub classes: Option<String>,
    pub num_of_classes: i32,
    pub size_bytes: i64,
}
