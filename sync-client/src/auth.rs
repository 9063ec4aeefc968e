//! Login against the central service.

use std::time::Duration;

use tether_sync_types::{LoginRequest, LoginResponse, SyncError};

use crate::api::{network_error, read_envelope, ApiClient};

/// Calls `{api_base}/auth/login`.
#[derive(Debug, Clone)]
pub struct AuthClient {
    api: ApiClient,
    request_timeout: Duration,
}

impl AuthClient {
    /// Create a login client for `api_base`.
    pub fn new(api_base: &str, request_timeout: Duration) -> Result<Self, SyncError> {
        Ok(Self {
            api: ApiClient::new(api_base, request_timeout)?,
            request_timeout,
        })
    }

    /// Exchange credentials for a session token.
    ///
    /// # Errors
    ///
    /// `Auth(Invalid)` for wrong credentials, `Auth(LockedOut)` while the
    /// identifier is locked out, `Network` when the service is unreachable.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, SyncError> {
        tracing::debug!("Logging in via {}", self.api.url("auth/login"));
        let response = self
            .api
            .http()
            .post(self.api.url("auth/login"))
            .timeout(self.request_timeout)
            .json(request)
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
    use tether_sync_types::{AuthError, LoginIdentifier};

    fn request() -> LoginRequest {
        LoginRequest {
            identifier: LoginIdentifier::Email("me@example.com".into()),
            password: "hunter22".into(),
        }
    }

    #[tokio::test]
    async fn login_returns_token_and_profile() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"code":200,"message":"ok","data":{"token":"eyJ.a.b","user":{"id":"u1","username":"alice","role":"admin"}}}"#,
        )
        .await;

        let client = AuthClient::new(&base, Duration::from_secs(5)).unwrap();
        let response = client.login(&request()).await.unwrap();
        assert_eq!(response.token, "eyJ.a.b");
        assert_eq!(response.user.username, "alice");

        let raw = String::from_utf8_lossy(&server.await.unwrap()).into_owned();
        assert!(raw.starts_with("POST /api/auth/login "));
        assert!(raw.contains(r#""email":"me@example.com""#));
        assert!(!raw.to_ascii_lowercase().contains("authorization:"));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid() {
        let (base, _server) =
            serve_once("200 OK", r#"{"code":401,"message":"invalid credentials"}"#).await;

        let client = AuthClient::new(&base, Duration::from_secs(5)).unwrap();
        let result = client.login(&request()).await;
        assert_eq!(result.err(), Some(SyncError::Auth(AuthError::Invalid)));
    }

    #[tokio::test]
    async fn lockout_is_reported() {
        let (base, _server) = serve_once(
            "423 Locked",
            r#"{"code":423,"message":"too many failed attempts"}"#,
        )
        .await;

        let client = AuthClient::new(&base, Duration::from_secs(5)).unwrap();
        let result = client.login(&request()).await;
        assert_eq!(result.err(), Some(SyncError::Auth(AuthError::LockedOut)));
    }
}
