//! Storage engine error types

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the SQLite storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// The database file could not be opened or created
    #[error("Cache database unavailable at {}: {message}", path.display())]
    Unavailable { path: PathBuf, message: String },

    /// A migration could not be applied
    #[error("Failed to apply cache schema version {version}: {message}")]
    Schema { version: i32, message: String },

    /// A single statement or transaction failed
    #[error("Cache operation '{operation}' failed: {message}")]
    Query { operation: String, message: String },
}

impl StorageError {
    /// Create an unavailable error
    pub fn unavailable(path: &Path, message: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a schema error
    pub fn schema(version: i32, message: impl Into<String>) -> Self {
        Self::Schema {
            version,
            message: message.into(),
        }
    }

    /// Create a query error
    pub fn query(operation: &str, message: impl Into<String>) -> Self {
        Self::Query {
            operation: operation.to_string(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        Self::query("database", err.to_string())
    }
}
