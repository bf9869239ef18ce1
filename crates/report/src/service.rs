//! Transport-agnostic report service facade.
//!
//! [`ReportService`] owns the pipeline: it builds the job queue, spawns the
//! single [`ReportWorker`] and exposes the boundary operations an HTTP (or
//! any other) layer binds to.
//!
//! | Operation | Returns |
//! |-----------|---------|
//! | [`submit`](ReportService::submit) | the new [`ReportId`], status `creating` |
//! | [`status`](ReportService::status) | current [`ReportStatus`] |
//! | [`failure_reason`](ReportService::failure_reason) | why a report failed |
//! | [`fetch`](ReportService::fetch) | raw report bytes once `created` |
//! | [`locate`](ReportService::locate) | on-disk artifact path, for archives that have one |
//! | [`metrics`](ReportService::metrics) | outcome counters |
//! | [`shutdown`](ReportService::shutdown) | drain admitted jobs and stop the worker |

use std::{path::PathBuf, sync::Arc};

use bytes::Bytes;
use parking_lot::Mutex;
use secretaudit_storage::{ArchiveBackend, ReportId, ReportStatus, StatusStore, StorageError};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    error::{ReportError, Result},
    metrics::{MetricsSnapshot, PipelineMetrics},
    queue::job_queue,
    source::{CreateReportRequest, SourceFactory},
    submitter::Submitter,
    worker::ReportWorker,
};

/// Response body of the create-report endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReportResponse {
    /// Identifier to poll and download the report with.
    #[serde(rename = "reportID")]
    pub report_id: ReportId,
}

/// Response body of the report-status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatusResponse {
    /// Current lifecycle state.
    #[serde(rename = "reportStatus")]
    pub report_status: ReportStatus,
}

/// The running report pipeline.
///
/// # Example
///
/// ```
/// use secretaudit_report::{
///     CreateReportRequest, PipelineConfig, ReportService, SourceHandles,
///     testutil::{ScriptedAuditSource, StaticSecretSource, StaticSourceFactory, valid_credentials},
/// };
/// use secretaudit_storage::{MemoryArchive, ReportStatus, StatusStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let factory = StaticSourceFactory::new(SourceHandles::new(
///     StaticSecretSource::new(vec![]),
///     ScriptedAuditSource::new(),
/// ));
/// let service =
///     ReportService::start(PipelineConfig::default(), StatusStore::new(), MemoryArchive::new(), factory);
///
/// let id = service.submit(&CreateReportRequest::new(valid_credentials()))?;
/// service.shutdown().await;
///
/// assert_eq!(service.status(&id.to_string())?, ReportStatus::Created);
/// assert_eq!(service.fetch(&id.to_string()).await?.as_ref(), b"[]");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ReportService<A, F> {
    config: PipelineConfig,
    status: StatusStore,
    archive: A,
    submitter: Submitter<F>,
    metrics: Arc<PipelineMetrics>,
    /// Wrapped in `Mutex` so `shutdown()` can take ownership via `&self`.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<A, F> ReportService<A, F>
where
    A: ArchiveBackend + Clone + 'static,
    F: SourceFactory,
{
    /// Builds the queue and spawns the worker.
    ///
    /// `status` and `archive` may be shared with other components; the
    /// service only ever reads and writes them through their public APIs.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime context.
    pub fn start(config: PipelineConfig, status: StatusStore, archive: A, factory: F) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let (sender, receiver) = job_queue(config.queue_capacity());

        let worker = ReportWorker::new(status.clone(), archive.clone(), Arc::clone(&metrics));
        let handle = tokio::spawn(worker.run(receiver));

        let submitter = Submitter::new(sender, factory, status.clone(), Arc::clone(&metrics));
        info!(queue_capacity = config.queue_capacity().get(), "report service started");

        Self { config, status, archive, submitter, metrics, worker: Mutex::new(Some(handle)) }
    }

    /// Submits a report request without waiting.
    ///
    /// # Errors
    ///
    /// See [`Submitter::submit`].
    pub fn submit(&self, request: &CreateReportRequest) -> Result<ReportId> {
        self.submitter.submit(request)
    }

    /// Returns the status of a report.
    ///
    /// # Errors
    ///
    /// - [`ReportError::InvalidReportId`] if `id` is not a report identifier
    /// - [`ReportError::NotFound`] if no report was submitted under `id`
    pub fn status(&self, id: &str) -> Result<ReportStatus> {
        let id = ReportId::parse(id)?;
        self.status.read(&id).ok_or(ReportError::NotFound { id })
    }

    /// Returns why a report failed, or `None` if it has not failed.
    ///
    /// # Errors
    ///
    /// Same as [`status`](Self::status).
    pub fn failure_reason(&self, id: &str) -> Result<Option<String>> {
        let id = ReportId::parse(id)?;
        if self.status.read(&id).is_none() {
            return Err(ReportError::NotFound { id });
        }
        Ok(self.status.failure_reason(&id))
    }

    /// Returns the serialized report.
    ///
    /// # Errors
    ///
    /// - [`ReportError::InvalidReportId`] if `id` is not a report identifier
    /// - [`ReportError::NotFound`] if no report was submitted under `id`
    /// - [`ReportError::NotReady`] while the report is `creating`, or if it `failed`
    /// - [`ReportError::Storage`] if the archive read fails
    pub async fn fetch(&self, id: &str) -> Result<Bytes> {
        let id = ReportId::parse(id)?;
        self.ensure_created(id)?;
        let bytes = self.archive.read_raw(&id).await.inspect_err(|err| {
            warn!(report_id = %id, error = %err, "failed to read created report");
        })?;
        debug!(report_id = %id, bytes = bytes.len(), "report fetched");
        Ok(bytes)
    }

    /// Returns where the report file lives on local disk.
    ///
    /// # Errors
    ///
    /// - [`ReportError::Unsupported`] if the archive has no filesystem location
    /// - otherwise the same as [`fetch`](Self::fetch)
    pub async fn locate(&self, id: &str) -> Result<PathBuf> {
        let id = ReportId::parse(id)?;
        let Some(path) = self.archive.artifact_path(&id) else {
            return Err(ReportError::Unsupported { operation: "locate" });
        };
        self.ensure_created(id)?;
        if !self.archive.exists(&id).await? {
            return Err(StorageError::not_found(id.to_string()).into());
        }
        Ok(path)
    }

    /// Returns the outcome counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Jobs admitted but not yet picked up by the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.submitter.pending()
    }

    /// The configuration the service was started with.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The status store the service reads and writes.
    #[must_use]
    pub fn status_store(&self) -> &StatusStore {
        &self.status
    }

    /// The archive finished reports are written to.
    #[must_use]
    pub fn archive(&self) -> &A {
        &self.archive
    }

    /// Stops accepting submissions, lets the worker finish every admitted
    /// job, then waits for it to exit.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.submitter.close() {
            info!(pending = self.submitter.pending(), "report service shutting down");
        }
        // Take the handle so we can await it without holding the lock.
        let handle = self.worker.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(error = %err, "report worker panicked");
        }
    }

    fn ensure_created(&self, id: ReportId) -> Result<()> {
        match self.status.read(&id) {
            None => Err(ReportError::NotFound { id }),
            Some(ReportStatus::Created) => Ok(()),
            Some(status @ (ReportStatus::Creating | ReportStatus::Failed)) => {
                Err(ReportError::NotReady { id, status })
            },
        }
    }
}
