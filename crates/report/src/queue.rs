//! Bounded FIFO job queue between the submitter and the worker.
//!
//! Built on [`tokio::sync::mpsc`]. [`JobSender`] is cloneable so any number
//! of request handlers can offer work; [`JobReceiver`] is not, so only one
//! worker can ever drain the queue.
//!
//! Offers never wait. A full queue rejects the new job and leaves the jobs
//! already admitted untouched.
//!
//! ```
//! use secretaudit_report::queue::{OfferError, job_queue};
//! use std::num::NonZeroUsize;
//!
//! let (sender, _receiver) = job_queue(NonZeroUsize::MIN);
//! let slot = sender.try_reserve().unwrap();
//! assert!(matches!(sender.try_reserve(), Err(OfferError::Full { capacity: 1 })));
//! drop(slot);
//! assert!(sender.try_reserve().is_ok());
//! ```

use std::num::NonZeroUsize;

use secretaudit_storage::ReportId;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::source::SourceHandles;

/// One admitted unit of work: build the report `id` from `sources`.
///
/// A job moves from the sender to the worker and is consumed there, so it
/// cannot be duplicated:
///
/// ```compile_fail
/// fn assert_clone<T: Clone>() {}
/// assert_clone::<secretaudit_report::Job>();
/// ```
#[derive(Debug)]
pub struct Job {
    /// The report this job produces.
    pub id: ReportId,
    /// Where the job reads secrets and audit events from.
    pub sources: SourceHandles,
}

/// Why an offer was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OfferError {
    /// Every slot is taken.
    #[error("job queue is full (capacity {capacity})")]
    Full {
        /// The queue capacity.
        capacity: usize,
    },
    /// The worker is gone; the queue accepts nothing anymore.
    #[error("job queue is closed")]
    Closed,
}

/// Creates a queue holding at most `capacity` waiting jobs.
#[must_use]
pub fn job_queue(capacity: NonZeroUsize) -> (JobSender, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity.get());
    (JobSender { tx }, JobReceiver { rx })
}

/// Producer half of the job queue.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: mpsc::Sender<Job>,
}

impl JobSender {
    /// Reserves a slot without waiting.
    ///
    /// The slot holds its place in the queue until it is either
    /// [admitted](JobSlot::admit) or dropped, so callers can do setup work
    /// between reserving and admitting without risking a full queue.
    ///
    /// # Errors
    ///
    /// Returns [`OfferError::Full`] if no slot is free and
    /// [`OfferError::Closed`] if the receiver is gone.
    pub fn try_reserve(&self) -> Result<JobSlot<'_>, OfferError> {
        match self.tx.try_reserve() {
            Ok(permit) => Ok(JobSlot { permit }),
            Err(TrySendError::Full(())) => Err(OfferError::Full { capacity: self.capacity() }),
            Err(TrySendError::Closed(())) => Err(OfferError::Closed),
        }
    }

    /// Offers a job without waiting.
    ///
    /// # Errors
    ///
    /// Same as [`try_reserve`](Self::try_reserve). A refused job is dropped.
    pub fn try_offer(&self, job: Job) -> Result<(), OfferError> {
        self.try_reserve()?.admit(job);
        Ok(())
    }

    /// The maximum number of waiting jobs.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Jobs admitted (or slots reserved) but not yet taken by the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Returns `true` once the receiver has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A reserved queue slot.
///
/// Dropping it without calling [`admit`](Self::admit) frees the slot.
#[derive(Debug)]
pub struct JobSlot<'a> {
    permit: mpsc::Permit<'a, Job>,
}

impl JobSlot<'_> {
    /// Places the job in the reserved slot. Never fails and never waits.
    pub fn admit(self, job: Job) {
        self.permit.send(job);
    }
}

/// Consumer half of the job queue. There is exactly one.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::Receiver<Job>,
}

impl JobReceiver {
    /// Waits for the next job in admission order.
    ///
    /// Returns `None` once every [`JobSender`] is dropped and all admitted
    /// jobs have been handed out.
    pub async fn next(&mut self) -> Option<Job> {
        self.rx.recv().await
    }

    /// Stops accepting new jobs; already admitted jobs can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
