//! HTTP plumbing shared by the login client and the file API.
//!
//! Every response is expected to be an [`ApiResponse`] envelope. When the
//! body is not an envelope (proxy error pages, empty bodies), the HTTP
//! status is mapped the same way the envelope code would be.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tether_sync_types::{ApiResponse, SyncError};

/// Longest server message carried into an error.
const MAX_MESSAGE_LEN: usize = 200;

/// A reqwest client bound to one API base URL.
#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    /// Build a client for `base`. `connect_timeout` bounds connection setup
    /// only; callers add per-request timeouts where a call must be bounded.
    pub(crate) fn new(base: &str, connect_timeout: Duration) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URL for `path` under the base.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }
}

/// Read a response body and unwrap its envelope.
pub(crate) async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SyncError> {
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(network_error)?;
    parse_envelope(status, &body)
}

pub(crate) fn parse_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, SyncError> {
    match serde_json::from_slice::<ApiResponse<T>>(body) {
        Ok(envelope) => envelope.into_result(),
        Err(parse_error) => {
            let text = String::from_utf8_lossy(body);
            let message: String = text.trim().chars().take(MAX_MESSAGE_LEN).collect();
            match SyncError::from_status(status, message) {
                Some(error) => Err(error),
                None => Err(SyncError::Protocol(format!(
                    "unreadable response: {}",
                    parse_error
                ))),
            }
        }
    }
}

/// Map a reqwest failure to a network error.
pub(crate) fn network_error(error: reqwest::Error) -> SyncError {
    if error.is_timeout() {
        SyncError::Network("request timed out".into())
    } else {
        SyncError::Network(error.to_string())
    }
}

/// Minimal one-shot HTTP server for exercising real requests in tests.
#[cfg(test)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one request with `status` and a JSON `body`.
    ///
    /// Returns the base URL and a handle resolving to the raw request.
    pub(crate) async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (format!("http://{}/api", addr), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> Vec<u8> {
        let mut data = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return data;
            }
            data.extend_from_slice(&buf[..n]);

            let Some(head_end) = find(&data, b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&data[..head_end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok());
            let body = &data[head_end + 4..];
            match length {
                Some(length) if body.len() >= length => return data,
                Some(_) => continue,
                None if head.contains("transfer-encoding: chunked") => {
                    if body.ends_with(b"0\r\n\r\n") {
                        return data;
                    }
                }
                None => return data,
            }
        }
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }
}
