//! Transfer batch model.
//!
//! A [`Batch`] is an ordered list of [`TransferJob`]s sharing one remote
//! target directory. The coordinator in sync-client drives the jobs one at a
//! time; this module only tracks their status and aggregates the outcome.

use std::path::PathBuf;

use tether_sync_types::{JobId, SyncError};

/// Status of a single transfer job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobStatus {
    /// Not started yet.
    #[default]
    Waiting,
    /// Existence check or upload in progress.
    Transferring,
    /// Uploaded successfully.
    Completed,
    /// Check or upload failed.
    Failed(SyncError),
    /// Batch was cancelled before this job started.
    Cancelled,
}

impl JobStatus {
    /// Whether the job has reached a final status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }
}

/// A local file queued for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    /// Local path to read from.
    pub path: PathBuf,
    /// Name to store the file under.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

impl FileSource {
    /// Describe a file; `name` defaults to the final path component.
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name, size }
    }

    /// Override the stored name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// One file transfer inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferJob {
    /// Unique job id.
    pub id: JobId,
    /// Local source.
    pub source: PathBuf,
    /// Name shown to the user and sent to the server.
    pub display_name: String,
    /// Size in bytes.
    pub byte_size: u64,
    /// Remote directory.
    pub target_path: String,
    /// Fraction transferred, in `[0, 1]`.
    pub progress: f64,
    /// Current status.
    pub status: JobStatus,
}

impl TransferJob {
    fn new(source: FileSource, target_path: &str) -> Self {
        Self {
            id: JobId::new(),
            source: source.path,
            display_name: source.name,
            byte_size: source.size,
            target_path: target_path.to_string(),
            progress: 0.0,
            status: JobStatus::Waiting,
        }
    }
}

/// Aggregate outcome of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchResult {
    /// Every attempted file succeeded.
    Success(usize),
    /// At least one file failed.
    PartialSuccess {
        /// Completed jobs.
        succeeded: usize,
        /// Failed jobs.
        failed: usize,
    },
}

impl BatchResult {
    /// Whether no job failed.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl std::fmt::Display for BatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success(n) => write!(f, "{} file(s) transferred", n),
            Self::PartialSuccess { succeeded, failed } => {
                write!(f, "{} succeeded, {} failed", succeeded, failed)
            }
        }
    }
}

/// Final report of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// Aggregate result.
    pub result: BatchResult,
    /// Jobs in submission order with their final status.
    pub jobs: Vec<TransferJob>,
    /// Jobs cancelled before they started.
    pub cancelled: usize,
}

/// An ordered set of transfers to one target directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    target_path: String,
    jobs: Vec<TransferJob>,
    success_count: usize,
    fail_count: usize,
}

impl Batch {
    /// Create a batch.
    ///
    /// Fails with `InvalidArgument` if `files` is empty or `target_path`
    /// is blank.
    pub fn new(files: Vec<FileSource>, target_path: &str) -> Result<Self, SyncError> {
        if files.is_empty() {
            return Err(SyncError::InvalidArgument("no files to transfer".into()));
        }
        if target_path.trim().is_empty() {
            return Err(SyncError::InvalidArgument("target path is empty".into()));
        }
        if let Some(f) = files.iter().find(|f| f.name.is_empty()) {
            return Err(SyncError::InvalidArgument(format!(
                "cannot derive a file name from {}",
                f.path.display()
            )));
        }

        let jobs = files
            .into_iter()
            .map(|f| TransferJob::new(f, target_path))
            .collect();

        Ok(Self {
            target_path: target_path.to_string(),
            jobs,
            success_count: 0,
            fail_count: 0,
        })
    }

    /// Remote target directory.
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// Jobs in order.
    pub fn jobs(&self) -> &[TransferJob] {
        &self.jobs
    }

    /// Job at `index`.
    pub fn job(&self, index: usize) -> Option<&TransferJob> {
        self.jobs.get(index)
    }

    /// Number of jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Always false for a constructed batch.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Completed jobs so far.
    pub fn success_count(&self) -> usize {
        self.success_count
    }

    /// Failed jobs so far.
    pub fn fail_count(&self) -> usize {
        self.fail_count
    }

    /// Jobs with a terminal status.
    pub fn finished_count(&self) -> usize {
        self.jobs.iter().filter(|j| j.status.is_terminal()).count()
    }

    /// Mark a waiting job as in progress.
    pub fn start(&mut self, index: usize) {
        if let Some(job) = self.jobs.get_mut(index) {
            if job.status == JobStatus::Waiting {
                job.status = JobStatus::Transferring;
            }
        }
    }

    /// Record progress; the stored fraction never decreases.
    pub fn set_progress(&mut self, index: usize, fraction: f64) {
        if let Some(job) = self.jobs.get_mut(index) {
            job.progress = job.progress.max(fraction.clamp(0.0, 1.0));
        }
    }

    /// Mark a job as completed.
    ///
    /// A job that already failed (e.g. destination occupied) stays failed.
    pub fn complete(&mut self, index: usize) {
        let Some(job) = self.jobs.get_mut(index) else {
            return;
        };
        if job.status.is_terminal() {
            return;
        }
        job.status = JobStatus::Completed;
        job.progress = 1.0;
        self.success_count += 1;
    }

    /// Mark a job as failed. The first failure reason wins.
    pub fn fail(&mut self, index: usize, reason: SyncError) {
        let Some(job) = self.jobs.get_mut(index) else {
            return;
        };
        if job.status.is_terminal() {
            return;
        }
        job.status = JobStatus::Failed(reason);
        self.fail_count += 1;
    }

    /// Cancel every job still waiting. Returns how many were cancelled.
    pub fn cancel_remaining(&mut self) -> usize {
        let mut cancelled = 0;
        for job in &mut self.jobs {
            if job.status == JobStatus::Waiting {
                job.status = JobStatus::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Aggregate result from the current counters.
    pub fn result(&self) -> BatchResult {
        if self.fail_count == 0 {
            BatchResult::Success(self.success_count)
        } else {
            BatchResult::PartialSuccess {
                succeeded: self.success_count,
                failed: self.fail_count,
            }
        }
    }

    /// Consume the batch into its final report.
    pub fn into_report(self) -> BatchReport {
        let result = self.result();
        let cancelled = self
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Cancelled)
            .count();
        BatchReport {
            result,
            jobs: self.jobs,
            cancelled,
        }
    }
}
