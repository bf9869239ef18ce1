//! In-memory report archive.
//!
//! This module provides [`MemoryArchive`], an in-memory implementation of
//! [`ArchiveBackend`] suitable for tests and development.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Atomic writes**: The report is encoded before the lock is taken, so a
//!   failed encode leaves no artifact behind
//!
//! # Limitations
//!
//! - Data is not persisted; all reports are lost when the process exits
//! - No expiry; artifacts accumulate for the lifetime of the process

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{
    backend::{ArchiveBackend, encode_report},
    error::{StorageError, StorageResult},
    types::{ReportEntry, ReportId},
};

/// In-memory report archive keyed by [`ReportId`].
///
/// # Cloning
///
/// `MemoryArchive` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying artifacts.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    reports: Arc<RwLock<HashMap<ReportId, Bytes>>>,
}

impl MemoryArchive {
    /// Creates an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    /// Returns `true` if no artifact is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }
}

#[async_trait]
impl ArchiveBackend for MemoryArchive {
    #[tracing::instrument(skip(self, entries), fields(report_id = %id, entries = entries.len()))]
    async fn write(&self, id: &ReportId, entries: &[ReportEntry]) -> StorageResult<()> {
        let encoded = Bytes::from(encode_report(entries)?);
        self.reports.write().insert(*id, encoded);
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(report_id = %id))]
    async fn read_raw(&self, id: &ReportId) -> StorageResult<Bytes> {
        self.reports.read().get(id).cloned().ok_or_else(|| StorageError::not_found(id.to_string()))
    }

    async fn exists(&self, id: &ReportId) -> StorageResult<bool> {
        Ok(self.reports.read().contains_key(id))
    }

    #[tracing::instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<()> {
        // Acquiring the read lock proves we're not deadlocked
        let _unused = self.reports.read();
        Ok(())
    }
}
