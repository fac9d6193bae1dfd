pub mod datasets;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /datasets/ingest                                   ingest an extracted archive (POST)
/// /datasets                                          list by client or annotator (GET)
/// /datasets/{id}/records                             review page (GET)
/// /datasets/{id}/classes                             class labels (GET)
/// /datasets/{id}/annotations                         annotation export (GET)
/// /datasets/{id}/uploads                             upload job progress (GET)
/// /datasets/{id}/records/{record_id}/annotations     save annotation (POST)
/// /datasets/{id}/records/{record_id}/in-use          get, set in-use flag (GET, PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/datasets", datasets::router())
}
