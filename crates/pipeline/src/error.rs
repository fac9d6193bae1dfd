use std::path::PathBuf;

use labelhub_core::error::CoreError;
use labelhub_core::types::JobId;
use labelhub_storage::StorageError;

/// Errors raised by the ingestion, upload and assembly services.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Staging file {} is gone and '{key}' is not in storage", path.display())]
    MissingSource { path: PathBuf, key: String },

    #[error("Malformed upload job {id}: {reason}")]
    MalformedJob { id: JobId, reason: String },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a later retry of the same operation may succeed.
    ///
    /// A missing source counts as transient: the object may simply not be
    /// visible in the listing yet.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Database(_) | Self::Io { .. } | Self::MissingSource { .. } => true,
            Self::Core(_) | Self::MalformedJob { .. } => false,
        }
    }
}
