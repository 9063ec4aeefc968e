//! File transfer coordination.
//!
//! A [`TransferCoordinator`] runs one ordered batch of uploads. Every file is
//! preceded by a remote existence check, and every call is authorized with a
//! token fetched fresh from the [`TokenSource`](crate::token::TokenSource).
//!
//! The remote side is abstracted behind [`FileApi`]:
//! - [`HttpFileApi`] talks to the central service over HTTP
//! - [`MockFileApi`] scripts outcomes for tests
//!
//! # Example
//!
//! ```ignore
//! let coordinator = TransferCoordinator::new(api, tokens, ConflictPolicy::default());
//! let files = vec![FileSource::new("a.txt", 1024)];
//! let report = coordinator.run_batch(files, "/docs", &CancellationToken::new()).await?;
//! println!("{}", report.result);
//! ```

mod coordinator;
mod http;
mod mock;

pub use coordinator::{BatchError, TransferCoordinator, TransferEvent};
pub use http::HttpFileApi;
pub use mock::{MockFileApi, UploadCall};

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tether_sync_types::{CheckResult, SyncError, UploadResult};

/// Callback fed with the number of bytes sent since the previous call.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// What to do when the destination already holds a file of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum ConflictPolicy {
    /// Mark the job failed but still attempt the upload.
    #[default]
    #[serde(rename = "attempt", alias = "attempt_anyway")]
    AttemptAnyway,
    /// Mark the job failed and skip the upload.
    #[serde(rename = "skip")]
    Skip,
}

/// One upload call.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    /// Remote directory.
    pub target: &'a str,
    /// Name to store the file under.
    pub name: &'a str,
    /// Local file to read.
    pub source: &'a Path,
    /// Expected size in bytes.
    pub size: u64,
}

/// Remote file operations used by the coordinator.
#[async_trait]
pub trait FileApi: Send + Sync + 'static {
    /// Ask whether `target/name` already exists.
    async fn check_exists(
        &self,
        token: &str,
        target: &str,
        name: &str,
    ) -> Result<CheckResult, SyncError>;

    /// Stream `request.source` to the server, calling `progress` as bytes go out.
    async fn upload(
        &self,
        token: &str,
        request: UploadRequest<'_>,
        progress: ProgressFn,
    ) -> Result<UploadResult, SyncError>;
}

#[async_trait]
impl<T: FileApi + ?Sized> FileApi for Arc<T> {
    async fn check_exists(
        &self,
        token: &str,
        target: &str,
        name: &str,
    ) -> Result<CheckResult, SyncError> {
        (**self).check_exists(token, target, name).await
    }

    async fn upload(
        &self,
        token: &str,
        request: UploadRequest<'_>,
        progress: ProgressFn,
    ) -> Result<UploadResult, SyncError> {
        (**self).upload(token, request, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        policy: ConflictPolicy,
    }

    #[test]
    fn conflict_policy_defaults_to_attempt() {
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::AttemptAnyway);
    }

    #[test]
    fn conflict_policy_parses_from_toml() {
        let w: Wrapper = toml::from_str(r#"policy = "skip""#).unwrap();
        assert_eq!(w.policy, ConflictPolicy::Skip);

        let w: Wrapper = toml::from_str(r#"policy = "attempt""#).unwrap();
        assert_eq!(w.policy, ConflictPolicy::AttemptAnyway);

        let w: Wrapper = toml::from_str(r#"policy = "attempt_anyway""#).unwrap();
        assert_eq!(w.policy, ConflictPolicy::AttemptAnyway);

        assert!(toml::from_str::<Wrapper>(r#"policy = "overwrite""#).is_err());
    }
}
