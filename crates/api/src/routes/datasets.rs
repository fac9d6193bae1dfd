//! Route definitions for datasets, records and annotations.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::datasets;
use crate::state::AppState;

/// Dataset routes mounted at `/datasets`.
///
/// ```text
/// POST   /ingest                                 -> ingest_dataset
/// GET    /                                       -> list_datasets
/// GET    /{id}/records                           -> list_records
/// GET    /{id}/classes                           -> get_classes
/// GET    /{id}/annotations                       -> list_annotations
/// GET    /{id}/uploads                           -> upload_progress
/// POST   /{id}/records/{record_id}/annotations   -> save_annotation
/// GET    /{id}/records/{record_id}/in-use        -> get_in_use
/// PUT    /{id}/records/{record_id}/in-use        -> set_in_use
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ingest", post(datasets::ingest_dataset))
        .route("/", get(datasets::list_datasets))
        .route("/{id}/records", get(datasets::list_records))
        .route("/{id}/classes", get(datasets::get_classes))
        .route("/{id}/annotations", get(datasets::list_annotations))
        .route("/{id}/uploads", get(datasets::upload_progress))
        .route(
            "/{id}/records/{record_id}/annotations",
            post(datasets::save_annotation),
        )
        .route(
            "/{id}/records/{record_id}/in-use",
            get(datasets::get_in_use).put(datasets::set_in_use),
        )
}
