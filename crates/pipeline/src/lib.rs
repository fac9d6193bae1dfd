//! The chunk, upload and assemble pipeline plus annotator bookkeeping.
//!
//! ```text
//! ingest    extracted files -> records + round-robin assignment + upload jobs
//! upload    queued job -> StorageGateway::put -> delete staging file -> ack
//! assembler remote listing -> reassembled / downloaded cache files -> page
//! completion annotation write -> re-derived completion counters
//! ```
//!
//! Persistence sits behind [`Catalog`] and [`UploadQueue`]; both have a
//! Postgres implementation and an in-memory one in [`memory`].

pub mod assembler;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod error;
pub mod ingest;
pub mod memory;
pub mod queue;
pub mod records;
pub mod upload;

pub use assembler::{Assembler, MaterializedPage, MaterializedRecord};
pub use catalog::{Catalog, PgCatalog, SharedCatalog};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use ingest::{
    confine_extract_dir, list_extracted_files, IngestService, IngestionReport, IngestionRequest,
};
pub use queue::{PgUploadQueue, SharedQueue, UploadJob, UploadProgress, UploadQueue};
