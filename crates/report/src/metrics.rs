//! Report pipeline counters.
//!
//! All atomic operations use `Ordering::Relaxed`: each counter is independent
//! and monotonically increasing, and [`snapshot`](PipelineMetrics::snapshot)
//! reads them one after another, so counters may be slightly out of step with
//! each other. That is acceptable for telemetry.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free outcome counters for the report pipeline.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    submitted: AtomicU64,
    rejected_queue_full: AtomicU64,
    rejected_invalid: AtomicU64,
    created: AtomicU64,
    failed: AtomicU64,
}

impl PipelineMetrics {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an admitted submission.
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a submission refused because the queue was full.
    pub fn record_rejected_queue_full(&self) {
        self.rejected_queue_full.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a submission refused for bad input or an unusable source.
    pub fn record_rejected_invalid(&self) {
        self.rejected_invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a report that reached `created`.
    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a report that reached `failed`.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected_queue_full: self.rejected_queue_full.load(Ordering::Relaxed),
            rejected_invalid: self.rejected_invalid.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`PipelineMetrics`] at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Submissions admitted to the queue.
    pub submitted: u64,
    /// Submissions refused because the queue was full.
    pub rejected_queue_full: u64,
    /// Submissions refused for invalid input.
    pub rejected_invalid: u64,
    /// Reports persisted successfully.
    pub created: u64,
    /// Reports that failed.
    pub failed: u64,
}

impl MetricsSnapshot {
    /// Admitted reports that have not finished yet.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        self.submitted.saturating_sub(self.created + self.failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = PipelineMetrics::new();
        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_created();
        metrics.record_failed();
        metrics.record_rejected_queue_full();
        metrics.record_rejected_invalid();

        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot,
            MetricsSnapshot {
                submitted: 3,
                rejected_queue_full: 1,
                rejected_invalid: 1,
                created: 1,
                failed: 1,
            }
        );
        assert_eq!(snapshot.in_flight(), 1);
    }

    #[test]
    fn test_default_snapshot_is_zero() {
        assert_eq!(PipelineMetrics::default().snapshot(), MetricsSnapshot::default());
    }
}
