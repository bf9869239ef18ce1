//! Storage error types and result alias.
//!
//! This module defines the errors that can occur while persisting or reading
//! report artifacts. Every [`ArchiveBackend`](crate::ArchiveBackend) maps its
//! internal failures to these variants so the report pipeline can treat all
//! backends the same way.
//!
//! # Error Types
//!
//! - [`StorageError::NotFound`] - No artifact exists for the requested report
//! - [`StorageError::Serialization`] - The report could not be encoded or decoded
//! - [`StorageError::Io`] - The underlying medium (disk, network) failed
//!
//! # Example
//!
//! ```
//! use secretaudit_storage::{StorageError, StorageResult};
//!
//! fn lookup(report_id: &str) -> StorageResult<Vec<u8>> {
//!     Err(StorageError::not_found(report_id))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during archive operations.
///
/// Errors preserve their source chain via the `#[source]` attribute, so a
/// log line rendering the full chain shows the originating I/O error.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// No artifact exists for the requested key.
    ///
    /// For the report archive this means the report was never created, is
    /// still being created, or failed.
    #[error("Key not found: {key}")]
    NotFound {
        /// The key that was not found.
        key: String,
    },

    /// Serialization or deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
        /// The underlying error that caused serialization to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// I/O error from the storage medium.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the failed operation.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: Option<BoxError>,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error for the given key.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Io` error with the given message.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io { message: message.into(), source: None }
    }

    /// Creates a new `Io` error with a message and source error.
    #[must_use]
    pub fn io_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Io { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Returns `true` if this is a [`StorageError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Configuration validation errors.
///
/// Returned by the validating builders of configuration types such as
/// [`FileArchiveConfig`](crate::FileArchiveConfig).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A numeric field is below its allowed minimum.
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        /// Name of the offending field.
        field: &'static str,
        /// The minimum accepted value.
        min: String,
        /// The rejected value.
        value: String,
    },

    /// A field holds a value that is not acceptable for another reason.
    #[error("{field} is invalid: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
