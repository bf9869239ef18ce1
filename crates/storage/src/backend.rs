//! Report archive trait definition.
//!
//! This module defines the [`ArchiveBackend`] trait, the abstraction the
//! report pipeline persists finished reports through, plus the shared
//! encoding helpers every backend uses so the artifact bytes are identical
//! regardless of where they are stored.
//!
//! # Implementing a Backend
//!
//! 1. Implement the [`ArchiveBackend`] trait
//! 2. Encode reports with [`encode_report`] so the artifact format stays stable
//! 3. Map backend-specific errors to [`StorageError`]
//! 4. Run the [`conformance`](crate::conformance) suite against it
//!
//! See [`MemoryArchive`](crate::MemoryArchive) for a reference implementation.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;

use crate::{
    error::{StorageError, StorageResult},
    types::{ReportEntry, ReportId},
};

/// Durable, identifier-keyed store of finished reports.
///
/// Each [`ReportId`] owns exactly one artifact. Backends must be safe for
/// concurrent use across distinct identifiers.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`write`](ArchiveBackend::write) | Persist a report, overwriting any previous artifact |
/// | [`read_raw`](ArchiveBackend::read_raw) | Read the serialized artifact bytes |
/// | [`exists`](ArchiveBackend::exists) | Check whether an artifact is present |
/// | [`artifact_path`](ArchiveBackend::artifact_path) | Filesystem location, if the backend has one |
/// | [`health_check`](ArchiveBackend::health_check) | Verify backend availability |
///
/// # Example
///
/// ```
/// use secretaudit_storage::{ArchiveBackend, MemoryArchive, ReportId};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let archive = MemoryArchive::new();
/// let id = ReportId::generate();
///
/// archive.write(&id, &[]).await.unwrap();
/// assert_eq!(archive.read_raw(&id).await.unwrap().as_ref(), b"[]");
/// # });
/// ```
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    /// Persists a finished report.
    ///
    /// Readers never observe a partially written artifact: either the
    /// previous state (usually absent) or the complete new artifact.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn write(&self, id: &ReportId, entries: &[ReportEntry]) -> StorageResult<()>;

    /// Reads the serialized artifact for a report.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if no artifact exists for `id`.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn read_raw(&self, id: &ReportId) -> StorageResult<Bytes>;

    /// Returns `true` if an artifact exists for `id`.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn exists(&self, id: &ReportId) -> StorageResult<bool>;

    /// Returns where the artifact for `id` lives on the local filesystem.
    ///
    /// This is a pure path computation: it does not check that the artifact
    /// exists. Backends without a filesystem location return `None`.
    fn artifact_path(&self, _id: &ReportId) -> Option<PathBuf> {
        None
    }

    /// Checks that the backend can currently accept writes.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> StorageResult<()>;
}

#[async_trait]
impl<A: ArchiveBackend + ?Sized> ArchiveBackend for Arc<A> {
    async fn write(&self, id: &ReportId, entries: &[ReportEntry]) -> StorageResult<()> {
        (**self).write(id, entries).await
    }

    async fn read_raw(&self, id: &ReportId) -> StorageResult<Bytes> {
        (**self).read_raw(id).await
    }

    async fn exists(&self, id: &ReportId) -> StorageResult<bool> {
        (**self).exists(id).await
    }

    fn artifact_path(&self, id: &ReportId) -> Option<PathBuf> {
        (**self).artifact_path(id)
    }

    async fn health_check(&self) -> StorageResult<()> {
        (**self).health_check().await
    }
}

/// Serializes a report into the artifact format.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if encoding fails.
pub fn encode_report(entries: &[ReportEntry]) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(entries)
        .map_err(|e| StorageError::serialization_with_source("failed to encode report", e))
}

/// Parses artifact bytes back into report entries.
///
/// # Errors
///
/// Returns [`StorageError::Serialization`] if `bytes` is not a valid artifact.
pub fn decode_report(bytes: &[u8]) -> StorageResult<Vec<ReportEntry>> {
    serde_json::from_slice(bytes)
        .map_err(|e| StorageError::serialization_with_source("failed to decode report", e))
}
