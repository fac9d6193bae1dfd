//! Record and dataset lookups used by the review UI.

use labelhub_core::dataset::parse_classes;
use labelhub_core::error::CoreError;
use labelhub_db::models::annotator::AnnotatorDatasetLink;
use labelhub_db::models::dataset::Dataset;
use labelhub_db::models::record::{RecordAnnotation, UpdateRecord};
use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::PipelineError;

/// Class labels declared for a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetClasses {
    pub dataset_id: String,
    pub classes: Vec<String>,
    pub num_of_classes: i32,
}

fn record_not_found(record_id: &str) -> PipelineError {
    CoreError::NotFound {
        entity: "record",
        id: record_id.to_string(),
    }
    .into()
}

async fn require_dataset(catalog: &dyn Catalog, dataset_id: &str) -> Result<Dataset, PipelineError> {
    catalog.find_dataset(dataset_id).await?.ok_or_else(|| {
        CoreError::NotFound {
            entity: "dataset",
            id: dataset_id.to_string(),
        }
        .into()
    })
}

fn require_non_blank(value: &str, field: &str) -> Result<(), PipelineError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")).into());
    }
    Ok(())
}

/// Set the advisory `in_use` flag.
///
/// This is a plain write: two reviewers checking then setting the flag can
/// both succeed.
pub async fn set_record_in_use(
    catalog: &dyn Catalog,
    dataset_id: &str,
    record_id: &str,
    in_use: bool,
) -> Result<(), PipelineError> {
    let update = UpdateRecord {
        annotations: None,
        in_use: Some(in_use),
    };
    if !catalog.update_record_fields(dataset_id, record_id, &update).await? {
        return Err(record_not_found(record_id));
    }
    tracing::debug!(dataset_id, record_id, in_use, "Record in-use flag set");
    Ok(())
}

pub async fn is_record_in_use(
    catalog: &dyn Catalog,
    dataset_id: &str,
    record_id: &str,
) -> Result<bool, PipelineError> {
    catalog
        .find_record(dataset_id, record_id)
        .await?
        .map(|record| record.in_use)
        .ok_or_else(|| record_not_found(record_id))
}

pub async fn datasets_for_client(
    catalog: &dyn Catalog,
    client_id: &str,
) -> Result<Vec<Dataset>, PipelineError> {
    require_non_blank(client_id, "client_id")?;
    catalog.datasets_for_client(client_id).await
}

pub async fn dataset_links_for_annotator(
    catalog: &dyn Catalog,
    annotator_id: &str,
) -> Result<Vec<AnnotatorDatasetLink>, PipelineError> {
    require_non_blank(annotator_id, "annotator_id")?;
    catalog.annotator_links(annotator_id).await
}

pub async fn dataset_classes(
    catalog: &dyn Catalog,
    dataset_id: &str,
) -> Result<DatasetClasses, PipelineError> {
    let dataset = require_dataset(catalog, dataset_id).await?;
    Ok(DatasetClasses {
        classes: dataset.classes.as_deref().map(parse_classes).unwrap_or_default(),
        num_of_classes: dataset.num_of_classes,
        dataset_id: dataset.id,
    })
}

/// Every record's annotation payload, in record order.
pub async fn annotations_for_dataset(
    catalog: &dyn Catalog,
    dataset_id: &str,
) -> Result<Vec<RecordAnnotation>, PipelineError> {
    require_dataset(catalog, dataset_id).await?;
    catalog.record_annotations(dataset_id).await
}
