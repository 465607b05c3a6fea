//! Error types for the autocomplete library.
//!
//! All fallible operations return [`Result`], whose error side is the
//! [`AutocompleteError`] enum. Store backends report their own failures with
//! [`StorageError`](crate::storage::StorageError), which converts into
//! [`AutocompleteError::Storage`].
//!
//! # Examples
//!
//! ```
//! use autocomplete::error::{AutocompleteError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(AutocompleteError::invalid_config("batch_size must be greater than 0"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

/// The main error type for autocomplete operations.
#[derive(Error, Debug)]
pub enum AutocompleteError {
    /// The configured indexing strategy is not one this crate knows.
    #[error("Invalid index type: {0}")]
    InvalidIndexType(String),

    /// The requested result ordering is not one this crate knows.
    #[error("Invalid sort value: {0}")]
    InvalidSortOrder(String),

    /// A payload update targeted a key missing from the document hash.
    #[error("{container} does not contain {key}")]
    DocumentNotFound { container: String, key: String },

    /// No term-index member carries the given document key.
    #[error("key not found in zset: {key} ({set})")]
    MemberNotFound { set: String, key: String },

    /// Connection or command failure reported by the backing store.
    #[error("Storage error: {0}")]
    Storage(String),

    /// An optimistic transaction kept conflicting with concurrent writers.
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    /// A hydrated payload did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A hydration task panicked or was aborted.
    #[error("Thread join error: {0}")]
    ThreadJoinError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for operations that may fail with AutocompleteError.
pub type Result<T> = std::result::Result<T, AutocompleteError>;

impl AutocompleteError {
    /// Create a new invalid index type error.
    pub fn invalid_index_type<S: Into<String>>(msg: S) -> Self {
        AutocompleteError::InvalidIndexType(msg.into())
    }

    /// Create a new invalid sort order error.
    pub fn invalid_sort_order<S: Into<String>>(msg: S) -> Self {
        AutocompleteError::InvalidSortOrder(msg.into())
    }

    /// Create a new document not found error.
    pub fn document_not_found<C: Into<String>, K: Into<String>>(container: C, key: K) -> Self {
        AutocompleteError::DocumentNotFound {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Create a new member not found error.
    pub fn member_not_found<S: Into<String>, K: Into<String>>(set: S, key: K) -> Self {
        AutocompleteError::MemberNotFound {
            set: set.into(),
            key: key.into(),
        }
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        AutocompleteError::Storage(msg.into())
    }

    /// Create a new transaction conflict error.
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        AutocompleteError::TransactionConflict(msg.into())
    }

    /// Create a new decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        AutocompleteError::Decode(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        AutocompleteError::InvalidConfig(msg.into())
    }

    /// Whether this error reports a missing document or term-index member.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AutocompleteError::DocumentNotFound { .. } | AutocompleteError::MemberNotFound { .. }
        )
    }
}

impl From<tokio::task::JoinError> for AutocompleteError {
    fn from(err: tokio::task::JoinError) -> Self {
        AutocompleteError::ThreadJoinError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = AutocompleteError::invalid_index_type("7");
        assert_eq!(error.to_string(), "Invalid index type: 7");

        let error = AutocompleteError::storage("connection reset");
        assert_eq!(error.to_string(), "Storage error: connection reset");

        let error = AutocompleteError::document_not_found("ac:$cars", "toyota_prius_3");
        assert_eq!(error.to_string(), "ac:$cars does not contain toyota_prius_3");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(AutocompleteError::member_not_found("ac:$$cars", "x_1").is_not_found());
        assert!(AutocompleteError::document_not_found("ac:$cars", "x_1").is_not_found());
        assert!(!AutocompleteError::decode("bad payload").is_not_found());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<u32>("not json").unwrap_err();
        let error = AutocompleteError::from(json_error);

        match error {
            AutocompleteError::Json(_) => {} // Expected
            _ => panic!("Expected JSON error variant"),
        }
    }
}
