//! Error types for docshard
//!
//! Error codes:
//! - DOCSHARD_INVALID_ARGUMENT
//! - DOCSHARD_STORE_UNAVAILABLE
//! - DOCSHARD_NOT_COMPARABLE
//! - DOCSHARD_FIELD_NOT_INDEXED
//! - DOCSHARD_INDEX_EXISTS
//! - DOCSHARD_UNIQUE_VIOLATION
//! - DOCSHARD_SERIALIZATION
//!
//! Errors are never swallowed or downgraded by the composite layer. The first
//! error raised during a fan-out aborts the call.

use std::fmt;

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Severity levels for store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed but the store is healthy
    Error,
    /// Store handle is no longer usable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Errors raised by partition stores, locators and the composite layer
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Null, missing or malformed argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Partition migrated, closed, or store name unresolvable
    #[error("{0}")]
    StoreUnavailable(String),

    /// Sort field holds a value that has no total order
    #[error("Unable to sort on field '{field}': value is not comparable")]
    NotComparable { field: String },

    /// Operation requires an index that does not exist
    #[error("{field} is not indexed")]
    FieldNotIndexed { field: String },

    /// Index creation on an already indexed field
    #[error("index already exists on {field}")]
    IndexAlreadyExists { field: String },

    /// Write or index build would break a unique index
    #[error("unique constraint violated for {field} = {value}")]
    UniqueConstraintViolation { field: String, value: String },

    /// Document or token (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Error raised when a partition store disappeared under a caller.
    pub fn store_moved(store_name: &str) -> Self {
        StoreError::StoreUnavailable(format!(
            "State store '{}' is not available anymore and may have been migrated to another instance; \
             please re-discover its location from the state metadata.",
            store_name
        ))
    }

    /// Error raised when a closed partition store is used.
    pub fn store_closed(store_name: &str) -> Self {
        StoreError::StoreUnavailable(format!("Store {} is currently closed", store_name))
    }

    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        StoreError::InvalidArgument(reason.into())
    }

    pub fn not_comparable(field: impl Into<String>) -> Self {
        StoreError::NotComparable {
            field: field.into(),
        }
    }

    pub fn field_not_indexed(field: impl Into<String>) -> Self {
        StoreError::FieldNotIndexed {
            field: field.into(),
        }
    }

    /// Returns the stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::InvalidArgument(_) => "DOCSHARD_INVALID_ARGUMENT",
            StoreError::StoreUnavailable(_) => "DOCSHARD_STORE_UNAVAILABLE",
            StoreError::NotComparable { .. } => "DOCSHARD_NOT_COMPARABLE",
            StoreError::FieldNotIndexed { .. } => "DOCSHARD_FIELD_NOT_INDEXED",
            StoreError::IndexAlreadyExists { .. } => "DOCSHARD_INDEX_EXISTS",
            StoreError::UniqueConstraintViolation { .. } => "DOCSHARD_UNIQUE_VIOLATION",
            StoreError::Serialization(_) => "DOCSHARD_SERIALIZATION",
        }
    }

    /// Returns the severity level.
    ///
    /// A store that went away is fatal for the handle, not for the process:
    /// callers must re-resolve and must not retry against the same handle.
    pub fn severity(&self) -> Severity {
        match self {
            StoreError::StoreUnavailable(_) => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Returns true if the caller should re-resolve store locations
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::StoreUnavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            StoreError::invalid_argument("x").code(),
            "DOCSHARD_INVALID_ARGUMENT"
        );
        assert_eq!(
            StoreError::store_moved("s").code(),
            "DOCSHARD_STORE_UNAVAILABLE"
        );
        assert_eq!(
            StoreError::not_comparable("tags").code(),
            "DOCSHARD_NOT_COMPARABLE"
        );
        assert_eq!(
            StoreError::field_not_indexed("title").code(),
            "DOCSHARD_FIELD_NOT_INDEXED"
        );
    }

    #[test]
    fn test_unavailable_is_fatal() {
        let err = StoreError::store_moved("movies");
        assert!(err.is_unavailable());
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(err.to_string().contains("re-discover its location"));
    }

    #[test]
    fn test_field_not_indexed_message() {
        let err = StoreError::field_not_indexed("title");
        assert_eq!(err.to_string(), "title is not indexed");
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_from_serde_error() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: StoreError = parse.unwrap_err().into();
        assert_eq!(err.code(), "DOCSHARD_SERIALIZATION");
    }
}
