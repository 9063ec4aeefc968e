//! Mock file API for testing.

use super::{FileApi, ProgressFn, UploadRequest};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tether_sync_types::{CheckResult, SyncError, UploadResult};

/// Progress is reported in this many steps per upload.
const PROGRESS_STEPS: u64 = 4;

/// Scripted [`FileApi`].
///
/// Clones share state. Uploads do not read the source file; they report
/// progress in equal chunks of the declared size.
#[derive(Debug, Default, Clone)]
pub struct MockFileApi {
    inner: Arc<Mutex<MockFileApiInner>>,
}

#[derive(Debug, Default)]
struct MockFileApiInner {
    existing: HashSet<String>,
    check_failures: HashMap<String, SyncError>,
    upload_failures: HashMap<String, SyncError>,
    fail_next_check: VecDeque<SyncError>,
    checks: Vec<String>,
    uploads: Vec<UploadCall>,
    tokens: Vec<String>,
}

/// One recorded upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCall {
    /// Remote directory.
    pub target: String,
    /// Stored name.
    pub name: String,
    /// Declared size.
    pub size: u64,
}

impl MockFileApi {
    /// Create an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockFileApiInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pretend `name` already exists in every target directory.
    pub fn add_existing(&self, name: &str) {
        self.lock().existing.insert(name.to_string());
    }

    /// Fail every existence check for `name`.
    pub fn fail_check_for(&self, name: &str, error: SyncError) {
        self.lock().check_failures.insert(name.to_string(), error);
    }

    /// Fail the next existence check, whatever the file.
    pub fn fail_next_check(&self, error: SyncError) {
        self.lock().fail_next_check.push_back(error);
    }

    /// Fail every upload of `name`.
    pub fn fail_upload_for(&self, name: &str, error: SyncError) {
        self.lock().upload_failures.insert(name.to_string(), error);
    }

    /// Names checked, in call order.
    pub fn checks(&self) -> Vec<String> {
        self.lock().checks.clone()
    }

    /// Uploads attempted, in call order.
    pub fn uploads(&self) -> Vec<UploadCall> {
        self.lock().uploads.clone()
    }

    /// Tokens presented, one per call.
    pub fn tokens(&self) -> Vec<String> {
        self.lock().tokens.clone()
    }
}

#[async_trait]
impl FileApi for MockFileApi {
    async fn check_exists(
        &self,
        token: &str,
        target: &str,
        name: &str,
    ) -> Result<CheckResult, SyncError> {
        let mut inner = self.lock();
        inner.tokens.push(token.to_string());
        inner.checks.push(name.to_string());

        if let Some(error) = inner.fail_next_check.pop_front() {
            return Err(error);
        }
        if let Some(error) = inner.check_failures.get(name) {
            return Err(error.clone());
        }

        Ok(CheckResult {
            exists: inner.existing.contains(name),
            can_upload: true,
            file_name: name.to_string(),
            file_size: 0,
            path: target.to_string(),
        })
    }

    async fn upload(
        &self,
        token: &str,
        request: UploadRequest<'_>,
        progress: ProgressFn,
    ) -> Result<UploadResult, SyncError> {
        let failure = {
            let mut inner = self.lock();
            inner.tokens.push(token.to_string());
            inner.uploads.push(UploadCall {
                target: request.target.to_string(),
                name: request.name.to_string(),
                size: request.size,
            });
            inner.upload_failures.get(request.name).cloned()
        };

        let chunk = request.size / PROGRESS_STEPS;
        let mut sent = 0;
        for _ in 0..PROGRESS_STEPS - 1 {
            progress(chunk);
            sent += chunk;
            tokio::task::yield_now().await;
        }
        if let Some(error) = failure {
            return Err(error);
        }
        progress(request.size - sent);

        let mut inner = self.lock();
        inner.existing.insert(request.name.to_string());
        Ok(UploadResult {
            history_id: format!("h-{}", inner.uploads.len()),
            file_name: request.name.to_string(),
            file_size: request.size,
            storage_path: format!("{}/{}", request.target.trim_end_matches('/'), request.name),
        })
    }
}
