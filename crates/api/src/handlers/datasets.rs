//! Handlers for dataset ingestion, the review listing and annotation writes.

use std::path::{Component, Path as FsPath, PathBuf};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use labelhub_core::dataset::DatasetType;
use labelhub_core::pagination::{PageRequest, DEFAULT_PAGE_LIMIT};
use labelhub_pipeline::{
    completion, confine_extract_dir, list_extracted_files, records, IngestionRequest,
    UploadProgress,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::query::{DatasetListParams, RecordPageParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of `POST /datasets/ingest`.
///
/// `extract_dir` is a server-side directory holding an already extracted
/// archive, strictly inside the configured extract root. When `files` is
/// omitted every regular file directly inside it is ingested in name order.
#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub dataset_id: String,
    pub name: String,
    pub data_type: DatasetType,
    pub client_id: String,
    pub classes: Option<String>,
    pub size_bytes: Option<i64>,
    pub extract_dir: PathBuf,
    /// File names relative to `extract_dir`.
    pub files: Option<Vec<String>>,
}

/// Body of `POST /datasets/{id}/records/{record_id}/annotations`.
#[derive(Debug, Deserialize)]
pub struct AnnotationBody {
    pub annotator_id: String,
    /// Stored verbatim when a string, serialized as JSON otherwise.
    #[serde(default)]
    pub annotations: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct InUseBody {
    pub in_use: bool,
}

#[derive(Debug, Serialize)]
pub struct InUseState {
    pub dataset_id: String,
    pub record_id: String,
    pub in_use: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadProgressView {
    pub dataset_id: String,
    #[serde(flatten)]
    pub progress: UploadProgress,
    pub settled: bool,
}

/// Resolve a client-supplied name inside the extraction directory.
fn file_in(dir: &FsPath, name: &str) -> AppResult<PathBuf> {
    let relative = FsPath::new(name);
    let mut components = relative.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(relative)),
        _ => Err(AppError::BadRequest(format!(
            "'{name}' is not a plain file name"
        ))),
    }
}

fn annotation_payload(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// POST /api/v1/datasets/ingest
///
/// Create the dataset and its records, assign annotators and queue the
/// uploads. Responds once every upload job is enqueued.
pub async fn ingest_dataset(
    State(state): State<AppState>,
    Json(body): Json<IngestBody>,
) -> AppResult<impl IntoResponse> {
    let extract_dir = confine_extract_dir(&state.pipeline.extract_root, &body.extract_dir).await?;
    let files = match body.files {
        Some(names) => names
            .iter()
            .map(|name| file_in(&extract_dir, name))
            .collect::<AppResult<Vec<_>>>()?,
        None => list_extracted_files(&extract_dir).await?,
    };

    let report = state
        .ingest
        .submit_ingestion_batch(IngestionRequest {
            dataset_id: body.dataset_id,
            name: body.name,
            data_type: body.data_type,
            client_id: body.client_id,
            classes: body.classes,
            size_bytes: body.size_bytes,
            files,
            extract_dir: Some(extract_dir),
        })
        .await?;

    tracing::info!(
        dataset_id = %report.dataset_id,
        records = report.record_ids.len(),
        skipped = report.skipped.len(),
        "Dataset ingested"
    );

    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: report })))
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

/// GET /api/v1/datasets?client_id=... | ?annotator_id=...
///
/// A client's datasets, or an annotator's per-dataset assignment links.
pub async fn list_datasets(
    State(state): State<AppState>,
    Query(params): Query<DatasetListParams>,
) -> AppResult<Response> {
    match (non_blank(params.client_id), non_blank(params.annotator_id)) {
        (Some(client_id), None) => {
            let datasets = records::datasets_for_client(state.catalog.as_ref(), &client_id).await?;
            Ok(Json(DataResponse { data: datasets }).into_response())
        }
        (None, Some(annotator_id)) => {
            let links =
                records::dataset_links_for_annotator(state.catalog.as_ref(), &annotator_id)
                    .await?;
            Ok(Json(DataResponse { data: links }).into_response())
        }
        _ => Err(AppError::BadRequest(
            "exactly one of client_id or annotator_id is required".to_string(),
        )),
    }
}

/// GET /api/v1/datasets/{id}/records
///
/// One page of materialized records. Records whose bytes cannot be fetched
/// are left out of the page.
pub async fn list_records(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
    Query(params): Query<RecordPageParams>,
) -> AppResult<impl IntoResponse> {
    let page = PageRequest::new(
        params.page.unwrap_or(1),
        params.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
    )?;
    let annotator_id = non_blank(params.annotator_id);

    let materialized = state
        .assembler
        .materialize_page(&dataset_id, annotator_id.as_deref(), page)
        .await?;

    Ok(Json(DataResponse { data: materialized }))
}

/// GET /api/v1/datasets/{id}/classes
pub async fn get_classes(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let classes = records::dataset_classes(state.catalog.as_ref(), &dataset_id).await?;
    Ok(Json(DataResponse { data: classes }))
}

/// GET /api/v1/datasets/{id}/annotations
pub async fn list_annotations(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let annotations =
        records::annotations_for_dataset(state.catalog.as_ref(), &dataset_id).await?;
    Ok(Json(DataResponse { data: annotations }))
}

/// GET /api/v1/datasets/{id}/uploads
///
/// Upload job counts by status. `settled` turns true once no job is pending
/// or running.
pub async fn upload_progress(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let progress = state.queue.progress(&dataset_id).await?;
    Ok(Json(DataResponse {
        data: UploadProgressView {
            settled: progress.is_settled(),
            dataset_id,
            progress,
        },
    }))
}

// ---------------------------------------------------------------------------
// Record writes
// ---------------------------------------------------------------------------

/// POST /api/v1/datasets/{id}/records/{record_id}/annotations
///
/// Store the payload and return the recomputed completion counters.
pub async fn save_annotation(
    State(state): State<AppState>,
    Path((dataset_id, record_id)): Path<(String, String)>,
    Json(body): Json<AnnotationBody>,
) -> AppResult<impl IntoResponse> {
    let result = completion::record_annotation(
        state.catalog.as_ref(),
        &dataset_id,
        &record_id,
        &body.annotator_id,
        &annotation_payload(body.annotations),
    )
    .await?;

    Ok(Json(DataResponse { data: result }))
}

/// GET /api/v1/datasets/{id}/records/{record_id}/in-use
pub async fn get_in_use(
    State(state): State<AppState>,
    Path((dataset_id, record_id)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let in_use = records::is_record_in_use(state.catalog.as_ref(), &dataset_id, &record_id).await?;
    Ok(Json(DataResponse {
        data: InUseState {
            dataset_id,
            record_id,
            in_use,
        },
    }))
}

/// PUT /api/v1/datasets/{id}/records/{record_id}/in-use
///
/// Advisory only; concurrent reviewers are not locked out.
pub async fn set_in_use(
    State(state): State<AppState>,
    Path((dataset_id, record_id)): Path<(String, String)>,
    Json(body): Json<InUseBody>,
) -> AppResult<impl IntoResponse> {
    records::set_record_in_use(state.catalog.as_ref(), &dataset_id, &record_id, body.in_use)
        .await?;
    Ok(Json(DataResponse {
        data: InUseState {
            dataset_id,
            record_id,
            in_use: body.in_use,
        },
    }))
}
