use std::path::PathBuf;

/// Errors raised by storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage backend error for '{key}': {message}")]
    Backend { key: String, message: String },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn backend(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Backend {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// A missing object or a malformed key will not fix itself; disk and
    /// network failures might.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Backend { .. })
    }
}
