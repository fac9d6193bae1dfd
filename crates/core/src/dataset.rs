//! Dataset and record validation rules applied at ingestion time.
//!
//! Validation failures are reported before anything is persisted.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Declared content type of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    Image,
    Text,
}

impl DatasetType {
    /// Parse from the database `data_type` column.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "image" => Ok(Self::Image),
            "text" => Ok(Self::Text),
            other => Err(CoreError::Validation(format!(
                "Unknown dataset type '{other}'. Must be one of: image, text"
            ))),
        }
    }

    /// Database name value.
    pub fn name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
        }
    }
}

/// Split the UI's comma-separated class list into trimmed, non-empty labels.
pub fn parse_classes(classes: &str) -> Vec<String> {
    classes
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

fn require_non_blank(value: &str, field: &str, entity: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "Missing required {entity} field: {field}"
        )));
    }
    Ok(())
}

/// Validate the identity fields of a new dataset.
pub fn validate_dataset_fields(
    id: &str,
    name: &str,
    client_id: &str,
    size_bytes: i64,
) -> Result<(), CoreError> {
    require_non_blank(id, "id", "dataset")?;
    require_non_blank(name, "name", "dataset")?;
    require_non_blank(client_id, "client_id", "dataset")?;
    if size_bytes <= 0 {
        return Err(CoreError::Validation(
            "Missing required dataset field: size_bytes must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Validate the identity fields of a new record.
pub fn validate_record_fields(id: &str, dataset_id: &str, name: &str) -> Result<(), CoreError> {
    require_non_blank(id, "id", "record")?;
    require_non_blank(dataset_id, "dataset_id", "record")?;
    require_non_blank(name, "name", "record")?;
    Ok(())
}
