//! Error types for tracelens

use thiserror::Error;

/// Core error type for tracelens operations.
///
/// Context facet failures are not part of this enum: they are reported as
/// [`FacetError`] and absorbed by the extractor.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A store mutation failed and was rolled back.
    #[error("Store write failed: {source}")]
    StoreWriteFailed {
        #[source]
        source: rusqlite::Error,
    },

    /// The database file failed an integrity check.
    #[error("Store corruption detected: {0}")]
    StoreCorruption(String),

    #[error("Invalid search filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid diagnosis record: {0}")]
    InvalidRecord(String),

    #[error("Pattern catalog error: {0}")]
    Catalog(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Classify a SQLite error raised while mutating the store.
    ///
    /// Corruption codes map to [`Error::StoreCorruption`]; anything else is a
    /// failed write.
    pub(crate) fn from_write(err: rusqlite::Error) -> Self {
        if is_corruption(&err) {
            Error::StoreCorruption(err.to_string())
        } else {
            Error::StoreWriteFailed { source: err }
        }
    }

    /// Classify a SQLite error raised while reading the store.
    pub(crate) fn from_read(err: rusqlite::Error) -> Self {
        if is_corruption(&err) {
            Error::StoreCorruption(err.to_string())
        } else {
            Error::Database(err)
        }
    }
}

fn is_corruption(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseCorrupt) | Some(rusqlite::ErrorCode::NotADatabase)
    )
}

/// Why a single context facet could not be produced.
#[derive(Error, Debug)]
pub enum FacetError {
    #[error("{facet} facet unavailable: {reason}")]
    Unavailable { facet: &'static str, reason: String },

    #[error("command `{command}` timed out after {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    #[error("command `{command}` exited with status {status}")]
    CommandFailed { command: String, status: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FacetError {
    pub(crate) fn unavailable(facet: &'static str, reason: impl Into<String>) -> Self {
        FacetError::Unavailable {
            facet,
            reason: reason.into(),
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corruption_is_classified_separately() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CORRUPT),
            None,
        );
        assert!(matches!(Error::from_write(err), Error::StoreCorruption(_)));

        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
            None,
        );
        assert!(matches!(
            Error::from_write(err),
            Error::StoreWriteFailed { .. }
        ));
    }
}
