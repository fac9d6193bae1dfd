use std::sync::Arc;

use labelhub_pipeline::{Assembler, IngestService, PipelineConfig, SharedCatalog, SharedQueue};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: the services hold their backends behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Dataset, record and annotator persistence.
    pub catalog: SharedCatalog,
    /// Upload queue, read for progress reporting.
    pub queue: SharedQueue,
    pub ingest: IngestService,
    pub assembler: Assembler,
    /// Staging and cache layout; the cache root is served statically.
    pub pipeline: Arc<PipelineConfig>,
    pub config: Arc<ServerConfig>,
}
