//! Remote object storage behind the [`StorageGateway`] trait.
//!
//! Two backends are provided: [`LocalStorage`], a directory acting as a
//! bucket (development and tests), and [`S3Storage`] for S3-compatible
//! services. Keys are `/`-separated strings such as
//! `uploads/{dataset_id}/{file}`.

pub mod config;
pub mod error;
pub mod local;
pub mod s3;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempPath;

pub use config::{build_gateway, StorageConfig};
pub use error::StorageError;
pub use local::LocalStorage;
pub use s3::{S3Config, S3Storage};

/// A listed remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
}

/// Operations the pipeline needs from an object store.
///
/// `put` and `get` are idempotent: repeating either with the same arguments
/// leaves the same bytes behind.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Upload the local file at `local_path` to `key`, replacing any
    /// existing object.
    async fn put(&self, local_path: &Path, key: &str) -> Result<(), StorageError>;

    /// List every object whose key starts with `prefix`. Pagination is
    /// handled internally; the full listing is returned.
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, StorageError>;

    /// Download `key` to `dest`. The bytes land in a uniquely named scratch
    /// file next to `dest` and are renamed into place, so `dest` only ever
    /// holds a complete copy, even with concurrent downloads of the same key.
    async fn get(&self, key: &str, dest: &Path) -> Result<(), StorageError>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Shared handle used by the pipeline, worker and API.
pub type SharedStorage = Arc<dyn StorageGateway>;

/// A uniquely named, empty scratch file in `dir`. It is removed when dropped
/// unless it is persisted.
pub fn scratch_file_in(dir: &Path) -> Result<TempPath, StorageError> {
    tempfile::Builder::new()
        .prefix(".")
        .suffix(".part")
        .tempfile_in(dir)
        .map(|file| file.into_temp_path())
        .map_err(|e| StorageError::io(dir, e))
}

/// Rename a finished scratch file over `dest`.
pub fn persist_scratch(scratch: TempPath, dest: &Path) -> Result<(), StorageError> {
    scratch
        .persist(dest)
        .map_err(|e| StorageError::io(dest, e.error))
}
