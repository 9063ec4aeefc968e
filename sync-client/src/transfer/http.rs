//! [`FileApi`] over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use tether_sync_types::{CheckRequest, CheckResult, FileAction, SyncError, UploadResult};
use tokio_util::io::ReaderStream;

use super::{FileApi, ProgressFn, UploadRequest};
use crate::api::{network_error, read_envelope, ApiClient};
use crate::config::ClientConfig;

/// Talks to `{api_base}/files/check` and `{api_base}/files/upload`.
#[derive(Debug, Clone)]
pub struct HttpFileApi {
    api: ApiClient,
    request_timeout: Duration,
}

impl HttpFileApi {
    /// Create a file API for `api_base`.
    ///
    /// `request_timeout` bounds existence checks and connection setup;
    /// uploads are bounded only by the connection.
    pub fn new(api_base: &str, request_timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self {
            api: ApiClient::new(api_base, request_timeout)?,
            request_timeout,
        })
    }

    /// Create a file API from client configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self, SyncError> {
        Self::new(&config.server.api_base, config.transfer.request_timeout())
    }
}

#[async_trait]
impl FileApi for HttpFileApi {
    async fn check_exists(
        &self,
        token: &str,
        target: &str,
        name: &str,
    ) -> Result<CheckResult, SyncError> {
        let response = self
            .api
            .http()
            .post(self.api.url("files/check"))
            .bearer_auth(token)
            .timeout(self.request_timeout)
            .json(&CheckRequest::new(target, name))
            .send()
            .await
            .map_err(network_error)?;

        read_envelope(response).await
    }

    async fn upload(
        &self,
        token: &str,
        request: UploadRequest<'_>,
        progress: ProgressFn,
    ) -> Result<UploadResult, SyncError> {
        let file = tokio::fs::File::open(request.source).await?;

        // Bytes are counted as the body pulls them from disk.
        let stream = ReaderStream::new(file).map(move |chunk| {
            if let Ok(bytes) = &chunk {
                progress(bytes.len() as u64);
            }
            chunk
        });
        let part = Part::stream_with_length(reqwest::Body::wrap_stream(stream), request.size)
            .file_name(request.name.to_string());

        let form = Form::new()
            .text("path", request.target.to_string())
            .text("name", request.name.to_string())
            .text("action", FileAction::Upload.as_str())
            .part("file", part);

        let response = self
            .api
            .http()
            .post(self.api.url("files/upload"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        read_envelope(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_server::serve_once;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tether_sync_types::{AuthError, FileError};

    fn api(base: &str) -> HttpFileApi {
        HttpFileApi::new(base, Duration::from_secs(5)).unwrap()
    }

    fn counting() -> (ProgressFn, Arc<AtomicU64>) {
        let total = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&total);
        let progress: ProgressFn = Arc::new(move |n| {
            counter.fetch_add(n, Ordering::SeqCst);
        });
        (progress, total)
    }

    // ===========================================
    // Existence check
    // ===========================================

    #[tokio::test]
    async fn check_sends_bearer_and_json() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"code":200,"message":"ok","data":{"exists":true,"canUpload":true,"fileName":"a.txt","fileSize":3,"path":"/docs"}}"#,
        )
        .await;

        let result = api(&base).check_exists("tok", "/docs", "a.txt").await.unwrap();
        assert!(result.exists);
        assert_eq!(result.file_size, 3);

        let request = String::from_utf8_lossy(&server.await.unwrap()).to_ascii_lowercase();
        assert!(request.starts_with("post /api/files/check "));
        assert!(request.contains("authorization: bearer tok"));
        assert!(request.contains(r#""action":"check""#));
    }

    #[tokio::test]
    async fn check_maps_unauthorized_envelope() {
        let (base, _server) =
            serve_once("200 OK", r#"{"code":401,"message":"token expired","data":null}"#).await;

        let result = api(&base).check_exists("tok", "/docs", "a.txt").await;
        assert_eq!(result, Err(SyncError::Auth(AuthError::Invalid)));
    }

    #[tokio::test]
    async fn check_against_closed_port_is_network_error() {
        let result = api("http://127.0.0.1:9/api")
            .check_exists("tok", "/docs", "a.txt")
            .await;
        assert!(matches!(result, Err(SyncError::Network(_))));
    }

    // ===========================================
    // Upload
    // ===========================================

    #[tokio::test]
    async fn upload_streams_file_as_multipart() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'x'; 20_000]).unwrap();

        let (base, server) = serve_once(
            "200 OK",
            r#"{"code":200,"message":"ok","data":{"historyId":"h1","fileName":"big.bin","fileSize":20000,"storagePath":"/srv/docs/big.bin"}}"#,
        )
        .await;

        let (progress, sent) = counting();
        let request = UploadRequest {
            target: "/docs",
            name: "big.bin",
            source: file.path(),
            size: 20_000,
        };
        let result = api(&base).upload("tok", request, progress).await.unwrap();
        assert_eq!(result.history_id, "h1");
        assert_eq!(sent.load(Ordering::SeqCst), 20_000);

        let raw = server.await.unwrap();
        let request = String::from_utf8_lossy(&raw);
        assert!(request.to_ascii_lowercase().starts_with("post /api/files/upload "));
        assert!(request.contains(r#"name="action""#));
        assert!(request.contains(r#"name="file"; filename="big.bin""#));
        assert!(request.contains("upload"));
    }

    #[tokio::test]
    async fn upload_of_missing_file_fails_before_network() {
        let (progress, sent) = counting();
        let request = UploadRequest {
            target: "/docs",
            name: "gone.txt",
            source: std::path::Path::new("/nonexistent/gone.txt"),
            size: 1,
        };
        let result = api("http://127.0.0.1:9/api").upload("tok", request, progress).await;
        assert_eq!(result, Err(SyncError::File(FileError::NotFound)));
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upload_maps_disk_full_status() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (base, _server) = serve_once("507 Insufficient Storage", "").await;

        let (progress, _) = counting();
        let request = UploadRequest {
            target: "/docs",
            name: "empty.txt",
            source: file.path(),
            size: 0,
        };
        let result = api(&base).upload("tok", request, progress).await;
        assert_eq!(result, Err(SyncError::File(FileError::DiskFull)));
    }
}
