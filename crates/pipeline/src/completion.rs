//! Annotation writes and the counters derived from them.
//!
//! Every write triggers a full re-aggregation of the dataset percentage and
//! of the writer's per-dataset link; counters are never incremented.

use labelhub_core::error::CoreError;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::PipelineError;
use labelhub_db::models::record::UpdateRecord;

/// Counters after an annotation write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationResult {
    pub dataset_id: String,
    pub record_id: String,
    pub annotator_id: String,
    pub completion_percent: f64,
    pub annotator_completed: i32,
}

/// Store an annotation payload and recompute the dataset and
/// (annotator, dataset) completion counters.
pub async fn record_annotation(
    catalog: &dyn Catalog,
    dataset_id: &str,
    record_id: &str,
    annotator_id: &str,
    payload: &str,
) -> Result<AnnotationResult, PipelineError> {
    if annotator_id.trim().is_empty() {
        return Err(CoreError::Validation("annotator_id is required".to_string()).into());
    }

    let update = UpdateRecord {
        annotations: Some(payload.to_string()),
        in_use: None,
    };
    if !catalog
        .update_record_fields(dataset_id, record_id, &update)
        .await?
    {
        return Err(CoreError::NotFound {
            entity: "record",
            id: record_id.to_string(),
        }
        .into());
    }

    let completion_percent = recompute_dataset(catalog, dataset_id).await?;
    let annotator_completed = catalog
        .recompute_annotator_completion(annotator_id, dataset_id)
        .await?;

    tracing::info!(
        dataset_id,
        record_id,
        annotator_id,
        completion_percent,
        annotator_completed,
        "Annotation recorded"
    );

    Ok(AnnotationResult {
        dataset_id: dataset_id.to_string(),
        record_id: record_id.to_string(),
        annotator_id: annotator_id.to_string(),
        completion_percent,
        annotator_completed,
    })
}

/// Recompute a dataset's completion percentage and return it.
pub async fn recompute_dataset(catalog: &dyn Catalog, dataset_id: &str) -> Result<f64, PipelineError> {
    let not_found = || CoreError::NotFound {
        entity: "dataset",
        id: dataset_id.to_string(),
    };
    if !catalog.recompute_dataset_completion(dataset_id).await? {
        return Err(not_found().into());
    }
    let dataset = catalog.find_dataset(dataset_id).await?.ok_or_else(not_found)?;
    Ok(dataset.completion_percent)
}
