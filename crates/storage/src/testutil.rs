//! Shared test utilities for archive and pipeline testing.
//!
//! This module provides deterministic sample report data, a fault-injecting
//! archive wrapper, and assertion macros for [`StorageResult`] values. It is
//! feature-gated behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! secretaudit-storage = { path = "../storage", features = ["testutil"] }
//! ```
//!
//! Then import helpers:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use secretaudit_storage::testutil::{FailingArchive, sample_entries, sample_secret};
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
    backend::ArchiveBackend,
    error::{StorageError, StorageResult},
    memory::MemoryArchive,
    types::{AuditEvent, ReportEntry, ReportId, SecretMetadata},
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap_or_default()
}

/// Create a deterministic secret record.
///
/// Produces secrets named `"secret-003"` with id
/// `"arn:aws:secretsmanager:us-east-1:000000000000:secret:secret-003"`.
#[must_use]
pub fn sample_secret(idx: usize) -> SecretMetadata {
    let name = format!("secret-{idx:03}");
    SecretMetadata::builder()
        .id(format!("arn:aws:secretsmanager:us-east-1:000000000000:secret:{name}"))
        .name(name)
        .region("us-east-1")
        .build()
}

/// Create a deterministic audit event.
///
/// Events are one minute apart, alternating between two users.
#[must_use]
pub fn sample_event(idx: usize) -> AuditEvent {
    let user = if idx % 2 == 0 { "alice" } else { "bob" };
    let offset = i64::try_from(idx).unwrap_or(i64::MAX / 60);
    AuditEvent::builder()
        .user_name(user)
        .action("GetSecretValue")
        .timestamp(base_time() + Duration::minutes(offset))
        .build()
}

/// Create `count` report entries; entry `i` carries `i` audit events.
///
/// The same `count` always produces equal entries.
#[must_use]
pub fn sample_entries(count: usize) -> Vec<ReportEntry> {
    (0..count).map(|i| ReportEntry::new(sample_secret(i), (0..i).map(sample_event).collect())).collect()
}

/// An archive that delegates to a [`MemoryArchive`] but can be told to fail.
///
/// Failures are toggled at runtime, so a test can let some writes succeed and
/// then fail the next one.
#[derive(Debug, Clone, Default)]
pub struct FailingArchive {
    inner: MemoryArchive,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    write_attempts: Arc<AtomicUsize>,
}

impl FailingArchive {
    /// Creates a healthy archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `write` fail with an I/O error (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `read_raw` fail with an I/O error (or succeed again).
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of `write` calls seen, failed or not.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveBackend for FailingArchive {
    async fn write(&self, id: &ReportId, entries: &[ReportEntry]) -> StorageResult<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::io("injected write failure"));
        }
        self.inner.write(id, entries).await
    }

    async fn read_raw(&self, id: &ReportId) -> StorageResult<Bytes> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::io("injected read failure"));
        }
        self.inner.read_raw(id).await
    }

    async fn exists(&self, id: &ReportId) -> StorageResult<bool> {
        self.inner.exists(id).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::io("injected write failure"));
        }
        self.inner.health_check().await
    }
}

/// Assert that a [`StorageResult`] is a [`StorageError::NotFound`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use secretaudit_storage::assert_not_found;
/// use secretaudit_storage::{StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::not_found("missing"));
/// assert_not_found!(result);
/// ```
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "expected StorageError::NotFound, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "{}: expected StorageError::NotFound, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`.
///
/// Returns the inner value on success, panics with a descriptive message
/// on failure.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}
