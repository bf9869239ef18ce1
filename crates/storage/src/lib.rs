//! Report data model, status tracking and archive storage for secret audit
//! reports.
//!
//! This crate holds everything the report pipeline persists or shares
//! between its tasks: the report identifiers and contents, the concurrent
//! [`StatusStore`], and the [`ArchiveBackend`] abstraction finished reports
//! are written through.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  secretaudit-report                         │
//! │         (submitter, job queue, worker, service facade)      │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │         StatusStore          │    ArchiveBackend trait      │
//! │  (ReportId -> ReportStatus)  │ (write, read_raw, exists)    │
//! │                              ├──────────────┬───────────────┤
//! │                              │ MemoryArchive│  FileArchive  │
//! │                              │  (testing)   │ (local disk)  │
//! └──────────────────────────────┴──────────────┴───────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use secretaudit_storage::{ArchiveBackend, MemoryArchive, ReportId, ReportStatus, StatusStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let status = StatusStore::new();
//!     let archive = MemoryArchive::new();
//!     let id = ReportId::generate();
//!
//!     status.write(&id, ReportStatus::Creating);
//!     archive.write(&id, &[]).await?;
//!     status.write(&id, ReportStatus::Created);
//!
//!     assert_eq!(archive.read_raw(&id).await?.as_ref(), b"[]");
//!     Ok(())
//! }
//! ```
//!
//! # Available Archives
//!
//! | Archive | Use Case | Persistence |
//! |---------|----------|-------------|
//! | [`MemoryArchive`] | Testing, development | No |
//! | [`FileArchive`] | Single-node deployments | Local disk |
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module (sample reports, `FailingArchive`, assertion
//!   macros) and the archive `conformance` suite. Enable this in `[dev-dependencies]` for
//!   integration tests.

#![deny(unsafe_code)]

pub mod backend;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod conformance;
pub mod error;
pub mod file;
pub mod memory;
pub mod status;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::{ArchiveBackend, decode_report, encode_report};
pub use error::{BoxError, ConfigError, StorageError, StorageResult};
pub use file::{FileArchive, FileArchiveConfig};
pub use memory::MemoryArchive;
pub use status::StatusStore;
pub use types::{AuditEvent, InvalidReportId, ReportEntry, ReportId, ReportStatus, SecretMetadata};
