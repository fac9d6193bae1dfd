//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that accept
//! `&PgPool` as the first argument.

pub mod annotator_repo;
pub mod cursor_repo;
pub mod dataset_repo;
pub mod record_repo;
pub mod upload_job_repo;

pub use annotator_repo::AnnotatorRepo;
pub use cursor_repo::CursorRepo;
pub use dataset_repo::DatasetRepo;
pub use record_repo::RecordRepo;
pub use upload_job_repo::UploadJobRepo;
