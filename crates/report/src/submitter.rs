//! Report submission.
//!
//! [`Submitter::submit`] validates a request, connects its sources and
//! admits a job, all without waiting. The steps run in a fixed order:
//!
//! 1. validate the credentials
//! 2. build the source handles
//! 3. reserve a queue slot
//! 4. record `creating` for a fresh [`ReportId`]
//! 5. admit the job into the reserved slot
//!
//! A rejection at any step leaves no job and no status entry behind. Because
//! the status is recorded before the job becomes visible to the worker, the
//! worker's terminal write always lands after `creating`.

use std::sync::Arc;

use parking_lot::RwLock;
use secretaudit_storage::{ReportId, ReportStatus, StatusStore};
use tracing::{debug, info, warn};

use crate::{
    error::ReportError,
    metrics::PipelineMetrics,
    queue::{Job, JobSender, OfferError},
    source::{CreateReportRequest, SourceFactory},
};

/// Accepts report requests and hands them to the job queue.
///
/// Safe to share between request handlers; every method takes `&self`.
#[derive(Debug)]
pub struct Submitter<F> {
    sender: RwLock<Option<JobSender>>,
    factory: F,
    status: StatusStore,
    metrics: Arc<PipelineMetrics>,
}

impl<F: SourceFactory> Submitter<F> {
    /// Creates a submitter feeding `sender`.
    pub fn new(sender: JobSender, factory: F, status: StatusStore, metrics: Arc<PipelineMetrics>) -> Self {
        Self { sender: RwLock::new(Some(sender)), factory, status, metrics }
    }

    /// Submits a report request.
    ///
    /// Returns the new report's identifier; its status reads `creating` as
    /// soon as this returns.
    ///
    /// # Errors
    ///
    /// - [`ReportError::Validation`] if a credential field is missing or malformed
    /// - [`ReportError::Source`] if the source handles cannot be built
    /// - [`ReportError::QueueFull`] if no queue slot is free
    /// - [`ReportError::Shutdown`] after [`close`](Self::close)
    pub fn submit(&self, request: &CreateReportRequest) -> Result<ReportId, ReportError> {
        let credentials = &request.credentials;

        if let Err(err) = credentials.validate() {
            self.metrics.record_rejected_invalid();
            debug!(
                access_key_id = credentials.access_key_id(),
                region = credentials.region(),
                error = %err,
                "rejected invalid report request"
            );
            return Err(err);
        }

        let sources = match self.factory.connect(credentials) {
            Ok(sources) => sources,
            Err(err) => {
                self.metrics.record_rejected_invalid();
                warn!(
                    access_key_id = credentials.access_key_id(),
                    region = credentials.region(),
                    error = %err,
                    "failed to connect report sources"
                );
                return Err(err.into());
            },
        };

        let id = ReportId::generate();
        {
            let sender = self.sender.read();
            let Some(sender) = sender.as_ref() else {
                return Err(ReportError::Shutdown);
            };
            let slot = match sender.try_reserve() {
                Ok(slot) => slot,
                Err(OfferError::Full { capacity }) => {
                    self.metrics.record_rejected_queue_full();
                    warn!(
                        access_key_id = credentials.access_key_id(),
                        region = credentials.region(),
                        capacity,
                        "report queue is full, rejecting request"
                    );
                    return Err(ReportError::QueueFull { capacity });
                },
                Err(OfferError::Closed) => return Err(ReportError::Shutdown),
            };
            self.status.write(&id, ReportStatus::Creating);
            slot.admit(Job { id, sources });
        }

        self.metrics.record_submitted();
        info!(
            report_id = %id,
            access_key_id = credentials.access_key_id(),
            region = credentials.region(),
            "report request accepted"
        );
        Ok(id)
    }

    /// Stops accepting submissions.
    ///
    /// Dropping the last sender lets the worker drain what was already
    /// admitted and then stop. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        self.sender.write().take().is_some()
    }

    /// Jobs waiting for the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sender.read().as_ref().map_or(0, JobSender::pending)
    }
}
