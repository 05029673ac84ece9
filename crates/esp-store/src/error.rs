//! Error types for esp-store

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by collaborator backends.
///
/// A missing schema or package is not an error: lookups return `None`.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored document could not be decoded
    #[error("malformed document at {location}: {message}")]
    Malformed { location: String, message: String },

    /// Serialization error
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Index or type name that cannot be used as a storage location
    #[error("invalid storage name '{name}'")]
    InvalidName { name: String },

    /// Backend refused the operation or is unusable
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StorageError::Backend(format!("lock poisoned: {err}"))
    }
}
