//! Asynchronous secret audit report pipeline.
//!
//! A caller submits provider credentials and immediately receives a
//! [`ReportId`](secretaudit_storage::ReportId). A single background worker
//! then lists every secret, collects each secret's audit events, and
//! persists the report as one JSON artifact. Callers poll the status and
//! download the artifact once it is `created`.
//!
//! # Architecture
//!
//! ```text
//!  request handlers (many)
//!          │ submit()                 status() / fetch()
//!          ▼                                   │
//!   ┌─────────────┐  try_reserve  ┌─────────┐  │
//!   │  Submitter  │──────────────▶│JobQueue │  │
//!   └─────┬───────┘               └────┬────┘  │
//!         │ creating                   │ next  │
//!         ▼                            ▼       ▼
//!   ┌─────────────┐  created/failed ┌───────────────┐
//!   │ StatusStore │◀────────────────│ ReportWorker  │
//!   └─────────────┘                 └──────┬────────┘
//!                                          │ write
//!                                          ▼
//!                                  ┌───────────────┐
//!                                  │ArchiveBackend │
//!                                  └───────────────┘
//! ```
//!
//! [`ReportService`] wires these together and is the only type most
//! embedders need.
//!
//! # Guarantees
//!
//! - A submission either returns an identifier whose status reads `creating`,
//!   or is rejected with no job and no status entry.
//! - Jobs run one at a time in admission order.
//! - `created` implies the artifact exists; `failed` implies it was never
//!   written. No partial report is ever persisted.
//! - Once a report is `created` or `failed` its status never changes.
//!
//! # Limitations
//!
//! Source calls are not retried, only the first page of secrets and audit
//! events is read, and no timeout is applied to source or archive calls, so
//! one stalled call stalls every job behind it. Status entries and artifacts
//! are never expired.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with fake sources and source factories.
//! - **`failpoints`**: Enables the `worker-before-persist` fail point for failure injection tests.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod source;
pub mod submitter;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod worker;

pub use config::{DEFAULT_QUEUE_CAPACITY, PipelineConfig};
pub use error::{ReportError, Result, SourceError};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use queue::{Job, JobReceiver, JobSender, JobSlot, OfferError, job_queue};
pub use secretaudit_storage::ConfigError;
pub use service::{CreateReportResponse, ReportService, ReportStatusResponse};
pub use source::{
    AuditSource, CreateReportRequest, Credentials, MAX_AUDIT_EVENTS_PER_LOOKUP,
    MAX_SECRETS_PER_PAGE, SecretSource, SourceFactory, SourceHandles,
};
pub use submitter::Submitter;
pub use worker::ReportWorker;
