//! Error types for the report pipeline.
//!
//! - [`SourceError`] - a secret or audit source call failed
//! - [`ReportError`] - everything the [`ReportService`](crate::ReportService)
//!   boundary can reject or report
//!
//! Storage failures are carried as [`StorageError`] and configuration
//! failures as [`ConfigError`](secretaudit_storage::ConfigError), both from
//! `secretaudit-storage`.

use std::sync::Arc;

use secretaudit_storage::{BoxError, InvalidReportId, ReportId, ReportStatus, StorageError};
use thiserror::Error;

/// Result type alias for report pipeline operations.
pub type Result<T> = std::result::Result<T, ReportError>;

/// A call to an external secret or audit source failed.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum SourceError {
    /// The provider session could not be established.
    #[error("failed to connect to source: {message}")]
    Connect {
        /// Description of the failure.
        message: String,
    },

    /// A listing call was rejected or failed in transit.
    #[error("{operation} failed: {message}")]
    Request {
        /// Name of the failed call, e.g. `list_secrets`.
        operation: &'static str,
        /// Description of the failure.
        message: String,
        /// The underlying provider error.
        #[source]
        source: Option<BoxError>,
    },
}

impl SourceError {
    /// Creates a new `Connect` error.
    #[must_use]
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect { message: message.into() }
    }

    /// Creates a new `Request` error without a source.
    #[must_use]
    pub fn request(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Request { operation, message: message.into(), source: None }
    }

    /// Creates a new `Request` error wrapping the provider's error.
    #[must_use]
    pub fn request_with_source(
        operation: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Request { operation, message: message.into(), source: Some(Arc::new(source)) }
    }
}

/// Errors surfaced at the report service boundary.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    /// A request field is missing or malformed. Nothing was enqueued.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// A report identifier could not be parsed.
    #[error(transparent)]
    InvalidReportId(#[from] InvalidReportId),

    /// The job queue is at capacity. No job or status entry was created.
    #[error("report queue is full (capacity {capacity})")]
    QueueFull {
        /// The configured queue capacity.
        capacity: usize,
    },

    /// The pipeline has shut down and no longer accepts work.
    #[error("report pipeline is shut down")]
    Shutdown,

    /// Establishing the source session failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Reading from the archive failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No report was ever submitted under this identifier.
    #[error("report {id} not found")]
    NotFound {
        /// The unknown identifier.
        id: ReportId,
    },

    /// The report exists but has no downloadable artifact.
    #[error("report {id} is not ready (status: {status})")]
    NotReady {
        /// The report identifier.
        id: ReportId,
        /// Its current status, `creating` or `failed`.
        status: ReportStatus,
    },

    /// The configured archive does not support the requested operation.
    #[error("{operation} is not supported by the configured archive")]
    Unsupported {
        /// The unsupported operation.
        operation: &'static str,
    },
}

impl ReportError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation { field, reason: reason.into() }
    }

    /// Returns `true` if the caller sent a bad request.
    ///
    /// Maps to a 4xx class response in an HTTP binding.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::InvalidReportId(_) | Self::NotFound { .. })
    }

    /// Returns `true` if retrying the same request later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::QueueFull { .. } | Self::NotReady { status: ReportStatus::Creating, .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_source_error_display() {
        let err = SourceError::request("list_secrets", "access denied");
        assert_eq!(err.to_string(), "list_secrets failed: access denied");
        assert_eq!(SourceError::connect("bad region").to_string(), "failed to connect to source: bad region");
    }

    #[test]
    fn test_source_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = SourceError::request_with_source("list_audit_events", "lookup failed", io);
        assert_eq!(err.source().map(ToString::to_string).as_deref(), Some("timed out"));
    }

    #[test]
    fn test_report_error_classification() {
        let id = ReportId::generate();
        assert!(ReportError::validation("region", "must not be empty").is_client_error());
        assert!(ReportError::NotFound { id }.is_client_error());
        assert!(!ReportError::QueueFull { capacity: 1 }.is_client_error());

        assert!(ReportError::QueueFull { capacity: 1 }.is_retryable());
        assert!(ReportError::NotReady { id, status: ReportStatus::Creating }.is_retryable());
        assert!(!ReportError::NotReady { id, status: ReportStatus::Failed }.is_retryable());
    }

    #[test]
    fn test_invalid_report_id_converts() {
        let err: ReportError = ReportId::parse("nope").unwrap_err().into();
        assert!(matches!(err, ReportError::InvalidReportId(_)));
        assert!(err.is_client_error());
    }
}
