//! The single report worker.
//!
//! [`ReportWorker::run`] drains the [`JobReceiver`] one job at a time, in
//! admission order. For each job it lists the secrets, looks up every
//! secret's audit events in order, and persists the assembled report:
//!
//! ```text
//!            list_secrets ──err──┐
//!                 │              │
//!     for each secret:           │
//!       list_audit_events ──err──┤
//!                 │              │
//!           archive.write ──err──┤
//!                 │              ▼
//!              Created         Failed
//! ```
//!
//! Any failure abandons the job and discards what was gathered so far, so a
//! partial report is never persisted. Each job starts from an empty report.

use std::sync::Arc;

use fail::fail_point;
use secretaudit_storage::{
    ArchiveBackend, ReportEntry, ReportId, ReportStatus, StatusStore, StorageError, StorageResult,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    error::SourceError,
    metrics::PipelineMetrics,
    queue::{Job, JobReceiver},
    source::SourceHandles,
};

/// Why a job could not assemble its report.
#[derive(Debug, Error)]
enum AssemblyError {
    #[error("failed to list secrets: {0}")]
    ListSecrets(#[source] SourceError),

    #[error("failed to list audit events for secret {secret}: {source}")]
    AuditLookup {
        secret: String,
        #[source]
        source: SourceError,
    },
}

/// Processes report jobs and records their outcome.
#[derive(Debug)]
pub struct ReportWorker<A> {
    status: StatusStore,
    archive: A,
    metrics: Arc<PipelineMetrics>,
}

impl<A: ArchiveBackend> ReportWorker<A> {
    /// Creates a worker writing to `status` and `archive`.
    pub fn new(status: StatusStore, archive: A, metrics: Arc<PipelineMetrics>) -> Self {
        Self { status, archive, metrics }
    }

    /// Processes jobs until the queue is closed and empty.
    ///
    /// Each job runs in its own task, awaited before the next one starts. A
    /// job that panics is marked failed and the worker carries on with the
    /// rest of the queue.
    pub async fn run(self, mut jobs: JobReceiver)
    where
        A: 'static,
    {
        info!("report worker started");
        let worker = Arc::new(self);
        while let Some(job) = jobs.next().await {
            let id = job.id;
            let task = Arc::clone(&worker);
            if let Err(err) = tokio::spawn(async move { task.process(job).await }).await {
                error!(report_id = %id, error = %err, "report job panicked");
                worker.settle_failed(&id, "report worker panicked".to_owned());
            }
        }
        info!("job queue closed, report worker stopped");
    }

    /// Runs one job to completion and returns the status it settled on.
    #[tracing::instrument(name = "process_report", skip_all, fields(report_id = %job.id))]
    pub async fn process(&self, job: Job) -> ReportStatus {
        let Job { id, sources } = job;
        debug!("processing report job");

        let entries = match assemble(&sources).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "report assembly failed");
                return self.settle_failed(&id, err.to_string());
            },
        };

        match self.persist(&id, &entries).await {
            Ok(()) => self.settle_created(&id, entries.len()),
            Err(err) => {
                warn!(error = %err, "failed to persist report");
                self.settle_failed(&id, format!("failed to persist report: {err}"))
            },
        }
    }

    async fn persist(&self, id: &ReportId, entries: &[ReportEntry]) -> StorageResult<()> {
        fail_point!("worker-before-persist", |_| {
            Err(StorageError::io("injected failure at worker-before-persist"))
        });
        self.archive.write(id, entries).await
    }

    fn settle_created(&self, id: &ReportId, entries: usize) -> ReportStatus {
        if self.status.write(id, ReportStatus::Created) {
            self.metrics.record_created();
            info!(entries, "report created");
        }
        self.status.read(id).unwrap_or(ReportStatus::Created)
    }

    fn settle_failed(&self, id: &ReportId, reason: String) -> ReportStatus {
        if self.status.fail(id, reason) {
            self.metrics.record_failed();
            info!("report failed");
        }
        self.status.read(id).unwrap_or(ReportStatus::Failed)
    }
}

/// Gathers one entry per secret, in source order, into a fresh report.
async fn assemble(sources: &SourceHandles) -> Result<Vec<ReportEntry>, AssemblyError> {
    let secrets = sources.secrets.list_secrets().await.map_err(AssemblyError::ListSecrets)?;
    debug!(secrets = secrets.len(), "listed secrets");

    let mut entries = Vec::with_capacity(secrets.len());
    for secret in secrets {
        // TODO: retry transient audit lookup failures with backoff before failing the job.
        let events = match sources.audit.list_audit_events(&secret).await {
            Ok(events) => events,
            Err(source) => {
                warn!(secret = %secret.name, error = %source, "audit lookup failed");
                return Err(AssemblyError::AuditLookup { secret: secret.name, source });
            },
        };
        debug!(secret = %secret.name, events = events.len(), "collected audit events");
        entries.push(ReportEntry::new(secret, events));
    }
    Ok(entries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::num::NonZeroUsize;

    use secretaudit_storage::{
        MemoryArchive, decode_report,
        testutil::{FailingArchive, sample_event, sample_secret},
    };

    use super::*;
    use crate::{
        queue::job_queue,
        testutil::{PanickingSecretSource, ScriptedAuditSource, StaticSecretSource},
    };

    fn worker<A: ArchiveBackend>(archive: A) -> (ReportWorker<A>, StatusStore, Arc<PipelineMetrics>) {
        let status = StatusStore::new();
        let metrics = Arc::new(PipelineMetrics::new());
        (ReportWorker::new(status.clone(), archive, Arc::clone(&metrics)), status, metrics)
    }

    fn admitted(status: &StatusStore, sources: SourceHandles) -> Job {
        let id = ReportId::generate();
        status.write(&id, ReportStatus::Creating);
        Job { id, sources }
    }

    #[tokio::test]
    async fn test_successful_job_persists_entries_in_order() {
        let archive = MemoryArchive::new();
        let (worker, status, metrics) = worker(archive.clone());
        let audit = ScriptedAuditSource::new()
            .with_events(&sample_secret(0).name, vec![sample_event(0), sample_event(1)])
            .with_events(&sample_secret(1).name, vec![sample_event(2)]);
        let job = admitted(
            &status,
            SourceHandles::new(
                StaticSecretSource::new(vec![sample_secret(0), sample_secret(1)]),
                audit,
            ),
        );
        let id = job.id;

        assert_eq!(worker.process(job).await, ReportStatus::Created);

        assert_eq!(status.read(&id), Some(ReportStatus::Created));
        let report = decode_report(&archive.read_raw(&id).await.unwrap()).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].metadata, sample_secret(0));
        assert_eq!(report[0].events, vec![sample_event(0), sample_event(1)]);
        assert_eq!(report[1].metadata, sample_secret(1));
        assert_eq!(report[1].events, vec![sample_event(2)]);
        assert_eq!(metrics.snapshot().created, 1);
    }

    #[tokio::test]
    async fn test_no_secrets_creates_empty_report() {
        let archive = MemoryArchive::new();
        let (worker, status, _) = worker(archive.clone());
        let job = admitted(
            &status,
            SourceHandles::new(StaticSecretSource::new(vec![]), ScriptedAuditSource::new()),
        );
        let id = job.id;

        assert_eq!(worker.process(job).await, ReportStatus::Created);
        assert_eq!(archive.read_raw(&id).await.unwrap().as_ref(), b"[]");
    }

    #[tokio::test]
    async fn test_secret_listing_failure_fails_job() {
        let archive = MemoryArchive::new();
        let (worker, status, metrics) = worker(archive.clone());
        let audit = ScriptedAuditSource::new();
        let job = admitted(
            &status,
            SourceHandles::new(StaticSecretSource::failing("access denied"), audit.clone()),
        );
        let id = job.id;

        assert_eq!(worker.process(job).await, ReportStatus::Failed);
        assert!(!archive.exists(&id).await.unwrap());
        assert!(audit.calls().is_empty(), "no audit lookups after listing fails");
        assert!(status.failure_reason(&id).unwrap().contains("failed to list secrets"));
        assert_eq!(metrics.snapshot().failed, 1);
    }

    #[tokio::test]
    async fn test_audit_failure_stops_and_discards_partial_report() {
        let archive = MemoryArchive::new();
        let (worker, status, _) = worker(archive.clone());
        let failing_name = sample_secret(1).name;
        let audit = ScriptedAuditSource::new().failing_for(&failing_name);
        let job = admitted(
            &status,
            SourceHandles::new(
                StaticSecretSource::new(vec![sample_secret(0), sample_secret(1), sample_secret(2)]),
                audit.clone(),
            ),
        );
        let id = job.id;

        assert_eq!(worker.process(job).await, ReportStatus::Failed);
        assert!(!archive.exists(&id).await.unwrap(), "no partial report may be persisted");
        assert_eq!(audit.calls(), vec![sample_secret(0).name, failing_name.clone()]);
        let reason = status.failure_reason(&id).unwrap();
        assert!(reason.contains(&failing_name), "reason should name the secret: {reason}");
    }

    #[tokio::test]
    async fn test_persist_failure_fails_job() {
        let archive = FailingArchive::new();
        archive.set_fail_writes(true);
        let (worker, status, _) = worker(archive.clone());
        let job = admitted(
            &status,
            SourceHandles::new(StaticSecretSource::new(vec![sample_secret(0)]), ScriptedAuditSource::new()),
        );
        let id = job.id;

        assert_eq!(worker.process(job).await, ReportStatus::Failed);
        assert_eq!(archive.write_attempts(), 1);
        assert!(status.failure_reason(&id).unwrap().starts_with("failed to persist report"));
    }

    #[tokio::test]
    async fn test_each_job_starts_with_an_empty_report() {
        let archive = MemoryArchive::new();
        let (worker, status, _) = worker(archive.clone());
        let audit = ScriptedAuditSource::new();

        let first = admitted(
            &status,
            SourceHandles::new(
                StaticSecretSource::new(vec![sample_secret(0), sample_secret(1)]),
                audit.clone(),
            ),
        );
        let second = admitted(
            &status,
            SourceHandles::new(StaticSecretSource::new(vec![sample_secret(7)]), audit),
        );
        let second_id = second.id;

        worker.process(first).await;
        worker.process(second).await;

        let report = decode_report(&archive.read_raw(&second_id).await.unwrap()).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].metadata, sample_secret(7));
    }

    #[tokio::test]
    async fn test_terminal_status_is_not_overwritten() {
        let archive = MemoryArchive::new();
        let (worker, status, metrics) = worker(archive);
        let job = admitted(
            &status,
            SourceHandles::new(StaticSecretSource::new(vec![]), ScriptedAuditSource::new()),
        );
        let id = job.id;
        status.fail(&id, "settled elsewhere");

        assert_eq!(worker.process(job).await, ReportStatus::Failed);
        assert_eq!(status.failure_reason(&id).as_deref(), Some("settled elsewhere"));
        assert_eq!(metrics.snapshot().created, 0);
    }

    #[tokio::test]
    async fn test_run_drains_queue_in_order_then_stops() {
        let archive = MemoryArchive::new();
        let (worker, status, _) = worker(archive.clone());
        let (sender, receiver) = job_queue(NonZeroUsize::new(8).unwrap());

        let mut ids = Vec::new();
        for i in 0..5 {
            let job = admitted(
                &status,
                SourceHandles::new(StaticSecretSource::new(vec![sample_secret(i)]), ScriptedAuditSource::new()),
            );
            ids.push(job.id);
            sender.try_offer(job).unwrap();
        }
        drop(sender);

        worker.run(receiver).await;

        for id in ids {
            assert_eq!(status.read(&id), Some(ReportStatus::Created));
        }
        assert_eq!(archive.len(), 5);
    }

    #[tokio::test]
    async fn test_panicking_job_fails_and_queue_keeps_draining() {
        let archive = MemoryArchive::new();
        let (worker, status, metrics) = worker(archive.clone());
        let (sender, receiver) = job_queue(NonZeroUsize::new(4).unwrap());

        let panicking = admitted(&status, SourceHandles::new(PanickingSecretSource, ScriptedAuditSource::new()));
        let healthy = admitted(
            &status,
            SourceHandles::new(StaticSecretSource::new(vec![sample_secret(0)]), ScriptedAuditSource::new()),
        );
        let (panicking_id, healthy_id) = (panicking.id, healthy.id);
        sender.try_offer(panicking).unwrap();
        sender.try_offer(healthy).unwrap();
        drop(sender);

        worker.run(receiver).await;

        assert_eq!(status.read(&panicking_id), Some(ReportStatus::Failed));
        assert_eq!(status.failure_reason(&panicking_id).as_deref(), Some("report worker panicked"));
        assert!(!archive.exists(&panicking_id).await.unwrap());
        assert_eq!(status.read(&healthy_id), Some(ReportStatus::Created));
        assert!(archive.exists(&healthy_id).await.unwrap());
        let snapshot = metrics.snapshot();
        assert_eq!((snapshot.created, snapshot.failed), (1, 1));
    }
}
