//! Error types for the Omada response cache
//!
//! Errors are grouped by the layer that produced them so callers can decide
//! whether a failure should degrade to a cache miss or be reported upward.

use thiserror::Error;

pub mod io;
pub mod serialization;
pub mod storage;
pub mod validation;

pub use self::io::{IoError, IoErrorKind};
pub use self::serialization::SerializationError;
pub use self::storage::StorageError;
pub use self::validation::ValidationError;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the cache library
///
/// - I/O errors: creating the directory that holds the database file
/// - Storage errors: the SQLite file could not be opened, migrated or queried
/// - Serialization errors: a payload could not be encoded or decoded
/// - Validation errors: bad input or configuration
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error(transparent)]
    Io(#[from] IoError),

    /// Storage engine errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Payload encoding/decoding errors
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Validation related errors
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// True when the cache itself is unusable (file missing, locked, disk full).
    ///
    /// Callers on the serving path treat this as a miss and go to the live API.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Storage(StorageError::Unavailable { .. })
        )
    }
}

// Conversions from external error types

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io(IoError::from_std(source))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(StorageError::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(SerializationError::encode("payload", &err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;
    use std::io;
    use std::path::Path;

    #[test]
    fn test_unavailable_classification() {
        let error = Error::Storage(StorageError::unavailable(
            Path::new("/tmp/omada_cache.db"),
            "unable to open database file",
        ));
        assert!(error.is_unavailable());

        let error = Error::Storage(StorageError::query("get", "no such table: api_cache"));
        assert!(!error.is_unavailable());

        let error: Error = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(error.is_unavailable());
    }

    #[test]
    fn test_sqlx_error_becomes_query_error() {
        let error: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(
            error,
            Error::Storage(StorageError::Query { .. })
        ));
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: Error = parse_error.into();
        assert!(matches!(error, Error::Serialization(_)));
        assert!(error.to_string().contains("payload"));
    }

    #[test]
    fn test_validation_error_display() {
        let error = Error::Validation(ValidationError::missing_field("UId"));
        assert!(error.to_string().contains("Missing required field"));
        assert!(error.to_string().contains("UId"));
    }

    #[test]
    fn test_error_source_chain() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Access denied");
        let error = Error::Io(IoError::from_std(io_error).with_path(Path::new("/var/cache")));

        assert!(error.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
