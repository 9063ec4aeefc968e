//! Sequential batch runner.

use std::sync::{Arc, Mutex, PoisonError};

use tether_sync_core::{Batch, BatchReport, FileSource, JobStatus, ProgressTracker};
use tether_sync_types::{AuthError, FileError, JobId, SyncError};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::{ConflictPolicy, FileApi, ProgressFn, UploadRequest};
use crate::token::TokenSource;

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// A job left `Waiting`.
    JobStarted {
        /// Job id.
        id: JobId,
        /// Position in the batch.
        index: usize,
        /// Stored file name.
        name: String,
    },
    /// Upload fraction moved forward.
    JobProgress {
        /// Job id.
        id: JobId,
        /// Fraction in `[0, 1]`; `1.0` only once the upload succeeded.
        fraction: f64,
    },
    /// A job reached a final status.
    JobFinished {
        /// Job id.
        id: JobId,
        /// Final status.
        status: JobStatus,
    },
    /// Batch-level progress.
    BatchProgress {
        /// Jobs with a final status.
        finished: usize,
        /// Jobs in the batch.
        total: usize,
    },
}

/// A batch that ended without a normal report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    /// Refused before any file was attempted.
    #[error(transparent)]
    Rejected(#[from] SyncError),

    /// The session was refused part way through. `report` covers every job:
    /// finished ones keep their status and the rest are cancelled.
    #[error("{error}")]
    SessionRejected {
        /// The authentication failure.
        error: SyncError,
        /// Outcome of the files handled before the session was refused.
        report: BatchReport,
    },
}

impl BatchError {
    /// The underlying error.
    pub fn error(&self) -> &SyncError {
        match self {
            Self::Rejected(error) | Self::SessionRejected { error, .. } => error,
        }
    }

    /// Partial report, when files were already attempted.
    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            Self::Rejected(_) => None,
            Self::SessionRejected { report, .. } => Some(report),
        }
    }

    /// Whether the caller must log in again.
    pub fn requires_reauth(&self) -> bool {
        self.error().requires_reauth()
    }
}

/// Runs batches of uploads one file at a time.
#[derive(Debug)]
pub struct TransferCoordinator<A: FileApi, S: TokenSource> {
    api: A,
    tokens: S,
    policy: ConflictPolicy,
    events: Option<UnboundedSender<TransferEvent>>,
}

impl<A: FileApi, S: TokenSource> TransferCoordinator<A, S> {
    /// Create a coordinator.
    pub fn new(api: A, tokens: S, policy: ConflictPolicy) -> Self {
        Self {
            api,
            tokens,
            policy,
            events: None,
        }
    }

    /// Send [`TransferEvent`]s to `events`.
    pub fn with_events(mut self, events: UnboundedSender<TransferEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Conflict policy in effect.
    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Upload `files` into `target`, in order.
    ///
    /// Per-file failures are recorded in the report and the batch moves on.
    /// An authentication failure marks the current job failed, cancels the
    /// rest and is returned as `Err` so the caller can log in again.
    ///
    /// # Errors
    ///
    /// [`BatchError::Rejected`] with `InvalidArgument` for an empty file list
    /// or blank target (before any network call).
    /// [`BatchError::SessionRejected`] with `Auth(..)` and the partial report
    /// when the session is missing or refused.
    pub async fn run_batch(
        &self,
        files: Vec<FileSource>,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        let mut batch = Batch::new(files, target)?;
        let total = batch.len();
        tracing::info!("Transferring {} file(s) to {}", total, batch.target_path());

        for index in 0..total {
            if cancel.is_cancelled() {
                let skipped = batch.cancel_remaining();
                tracing::info!("Batch cancelled, {} file(s) not started", skipped);
                self.report_cancelled(&batch, index);
                break;
            }

            batch.start(index);
            if let Some(job) = batch.job(index) {
                self.emit(TransferEvent::JobStarted {
                    id: job.id,
                    index,
                    name: job.display_name.clone(),
                });
            }

            let outcome = self.transfer_one(&mut batch, index).await;
            if let Err(error) = outcome {
                batch.fail(index, error.clone());
                if error.requires_reauth() {
                    tracing::warn!("Session rejected, aborting batch: {}", error);
                    self.report_finished(&batch, index);
                    batch.cancel_remaining();
                    self.report_cancelled(&batch, index + 1);
                    let report = batch.into_report();
                    tracing::info!("Batch aborted: {}", report.result);
                    return Err(BatchError::SessionRejected { error, report });
                }
            }
            self.report_finished(&batch, index);
        }

        let report = batch.into_report();
        tracing::info!("Batch finished: {}", report.result);
        Ok(report)
    }

    async fn transfer_one(&self, batch: &mut Batch, index: usize) -> Result<(), SyncError> {
        let Some(job) = batch.job(index).cloned() else {
            return Ok(());
        };

        let token = self.token().await?;
        let check = self
            .api
            .check_exists(&token, &job.target_path, &job.display_name)
            .await?;

        if check.exists {
            tracing::warn!("{} already exists in {}", job.display_name, job.target_path);
            batch.fail(index, FileError::Exists.into());
            if self.policy == ConflictPolicy::Skip {
                return Ok(());
            }
        }

        let tracker = Arc::new(Mutex::new(ProgressTracker::new(job.byte_size)));
        let progress: ProgressFn = {
            let tracker = Arc::clone(&tracker);
            let events = self.events.clone();
            let id = job.id;
            Arc::new(move |bytes| {
                let moved = tracker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .advance(bytes);
                if let (Some(fraction), Some(events)) = (moved, &events) {
                    let _ = events.send(TransferEvent::JobProgress { id, fraction });
                }
            })
        };

        let token = self.token().await?;
        let request = UploadRequest {
            target: &job.target_path,
            name: &job.display_name,
            source: &job.source,
            size: job.byte_size,
        };
        let uploaded = self.api.upload(&token, request, progress).await;

        let mut tracker = tracker.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(error) = uploaded {
            batch.set_progress(index, tracker.fraction());
            return Err(error);
        }

        let fraction = tracker.finish();
        batch.set_progress(index, fraction);
        self.emit(TransferEvent::JobProgress {
            id: job.id,
            fraction,
        });
        batch.complete(index);
        Ok(())
    }

    async fn token(&self) -> Result<String, SyncError> {
        self.tokens
            .token()
            .await
            .ok_or(SyncError::Auth(AuthError::Missing))
    }

    fn emit(&self, event: TransferEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn report_finished(&self, batch: &Batch, index: usize) {
        let Some(job) = batch.job(index) else {
            return;
        };
        match &job.status {
            JobStatus::Completed => tracing::info!("{} uploaded", job.display_name),
            JobStatus::Failed(reason) => {
                tracing::warn!("{} failed: {}", job.display_name, reason)
            }
            _ => {}
        }
        self.emit(TransferEvent::JobFinished {
            id: job.id,
            status: job.status.clone(),
        });
        self.emit(TransferEvent::BatchProgress {
            finished: batch.finished_count(),
            total: batch.len(),
        });
    }

    fn report_cancelled(&self, batch: &Batch, from: usize) {
        for job in batch.jobs().iter().skip(from) {
            if job.status == JobStatus::Cancelled {
                self.emit(TransferEvent::JobFinished {
                    id: job.id,
                    status: JobStatus::Cancelled,
                });
            }
        }
    }
}
