//! Concurrent report status store.
//!
//! [`StatusStore`] maps each [`ReportId`] to its [`ReportStatus`] and, for
//! failed reports, a short failure reason. Many readers may query it while
//! the submitter and the worker write to it.
//!
//! # Monotonic Writes
//!
//! The store enforces the report lifecycle itself rather than trusting its
//! callers:
//!
//! | Current | Written | Outcome |
//! |---------|---------|---------|
//! | absent | any | applied |
//! | `Creating` | `Created` / `Failed` | applied |
//! | any | same value | no-op, reported as applied |
//! | terminal | a different value | refused |
//!
//! A refused write returns `false` and is logged at `warn`. Once a report is
//! terminal, every later read returns the same value.
//!
//! # Limitations
//!
//! Entries are never evicted and do not survive a restart.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::types::{ReportId, ReportStatus};

#[derive(Debug, Clone)]
struct StatusRecord {
    status: ReportStatus,
    failure_reason: Option<String>,
}

/// Thread-safe map from report identifier to lifecycle status.
///
/// # Cloning
///
/// `StatusStore` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying entries.
///
/// # Example
///
/// ```
/// use secretaudit_storage::{ReportId, ReportStatus, StatusStore};
///
/// let store = StatusStore::new();
/// let id = ReportId::generate();
/// assert_eq!(store.read(&id), None);
///
/// assert!(store.write(&id, ReportStatus::Creating));
/// assert!(store.write(&id, ReportStatus::Created));
///
/// // Terminal states never change.
/// assert!(!store.write(&id, ReportStatus::Failed));
/// assert_eq!(store.read(&id), Some(ReportStatus::Created));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    entries: Arc<RwLock<HashMap<ReportId, StatusRecord>>>,
}

impl StatusStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the status of a report, or `None` if it was never recorded.
    #[must_use]
    pub fn read(&self, id: &ReportId) -> Option<ReportStatus> {
        self.entries.read().get(id).map(|record| record.status)
    }

    /// Records a status for a report, enforcing the lifecycle order.
    ///
    /// Returns `true` if the store now holds `status` for `id`, `false` if
    /// the write was refused because it would move the report backwards or
    /// between terminal states.
    pub fn write(&self, id: &ReportId, status: ReportStatus) -> bool {
        self.apply(id, status, None)
    }

    /// Marks a report as [`Failed`](ReportStatus::Failed) with a reason.
    ///
    /// Same acceptance rules as [`write`](Self::write).
    pub fn fail(&self, id: &ReportId, reason: impl Into<String>) -> bool {
        self.apply(id, ReportStatus::Failed, Some(reason.into()))
    }

    /// Returns why a report failed, if it failed with a recorded reason.
    #[must_use]
    pub fn failure_reason(&self, id: &ReportId) -> Option<String> {
        self.entries.read().get(id).and_then(|record| record.failure_reason.clone())
    }

    /// Returns the number of tracked reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no report is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn apply(&self, id: &ReportId, status: ReportStatus, failure_reason: Option<String>) -> bool {
        let mut entries = self.entries.write();
        let current = entries.get(id).map(|record| record.status);

        let accepted = match current {
            None => true,
            Some(existing) if existing == status => return true,
            Some(existing) => existing.can_transition_to(status),
        };

        if !accepted {
            drop(entries);
            warn!(
                report_id = %id,
                current = ?current,
                requested = %status,
                "refusing non-monotonic status write"
            );
            return false;
        }

        entries.insert(*id, StatusRecord { status, failure_reason });
        drop(entries);
        debug!(report_id = %id, status = %status, "status updated");
        true
    }
}
