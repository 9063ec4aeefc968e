//! JSON payloads exchanged with the central service.
//!
//! Every HTTP response is wrapped in an [`ApiResponse`] envelope carrying a
//! numeric `code`, a human-readable `message`, and an optional `data` body.
//! Field names on the wire are camelCase.

use serde::{Deserialize, Serialize};

use crate::SyncError;

/// Envelope code for success.
pub const CODE_OK: i64 = 200;
/// Envelope code for a missing, invalid or expired token.
pub const CODE_UNAUTHORIZED: i64 = 401;
/// Envelope code for a forbidden path.
pub const CODE_FORBIDDEN: i64 = 403;
/// Envelope code for a missing file or directory.
pub const CODE_NOT_FOUND: i64 = 404;
/// Envelope code for an occupied destination.
pub const CODE_EXISTS: i64 = 409;
/// Envelope code for a locked-out login identifier.
pub const CODE_LOCKED: i64 = 423;
/// Envelope code for a full destination volume.
pub const CODE_DISK_FULL: i64 = 507;

/// Response envelope used by every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Status code (HTTP-like, `0` is also accepted as success).
    pub code: i64,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Payload, present on success.
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Build a success envelope.
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_OK,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    /// Build a failure envelope.
    pub fn error(code: i64, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            data: None,
        }
    }

    /// Convert into the payload or a typed error.
    pub fn into_result(self) -> Result<T, SyncError> {
        let status = u16::try_from(self.code)
            .map_err(|_| SyncError::Protocol(format!("invalid response code {}", self.code)))?;
        if let Some(err) = SyncError::from_status(status, self.message) {
            return Err(err);
        }
        self.data
            .ok_or_else(|| SyncError::Protocol("response carried no data".into()))
    }
}

/// Action discriminator sent with file calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    /// Existence check.
    Check,
    /// Content upload.
    Upload,
}

impl FileAction {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Upload => "upload",
        }
    }
}

/// Existence-check request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Remote target directory.
    pub path: String,
    /// File name inside the target directory.
    pub name: String,
    /// Always [`FileAction::Check`].
    pub action: FileAction,
}

impl CheckRequest {
    /// Build a check request.
    pub fn new(path: &str, name: &str) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            action: FileAction::Check,
        }
    }
}

/// Existence-check response data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    /// Destination already occupied.
    pub exists: bool,
    /// Server would accept an upload.
    #[serde(default = "default_true")]
    pub can_upload: bool,
    /// Name the server resolved.
    #[serde(default)]
    pub file_name: String,
    /// Size of the existing file, if any.
    #[serde(default)]
    pub file_size: u64,
    /// Resolved remote path.
    #[serde(default)]
    pub path: String,
}

fn default_true() -> bool {
    true
}

/// Upload response data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Server-side transfer history record.
    pub history_id: String,
    /// Stored file name.
    pub file_name: String,
    /// Stored size in bytes.
    pub file_size: u64,
    /// Absolute storage path on the server.
    pub storage_path: String,
}

/// Which field identifies the account at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginIdentifier {
    /// Login by username.
    Username(String),
    /// Login by email address.
    Email(String),
    /// Login by phone number.
    Phone(String),
}

impl LoginIdentifier {
    /// The raw identifier value.
    pub fn value(&self) -> &str {
        match self {
            Self::Username(v) | Self::Email(v) | Self::Phone(v) => v,
        }
    }

    /// Lockout key: trimmed and lower-cased, so case variants share one counter.
    pub fn normalized(&self) -> String {
        self.value().trim().to_lowercase()
    }
}

/// Login request body: `{username|email|phone, password}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account identifier.
    #[serde(flatten)]
    pub identifier: LoginIdentifier,
    /// Plaintext password (TLS protects it on the wire).
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Public account details returned at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Stable user identifier.
    pub id: String,
    /// Display username.
    pub username: String,
    /// Role name (e.g. `"admin"`, `"user"`).
    pub role: String,
}

/// Login response data.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Signed session token.
    pub token: String,
    /// Authenticated user.
    pub user: UserProfile,
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &format!("[{} chars REDACTED]", self.token.len()))
            .field("user", &self.user)
            .finish()
    }
}

/// Inbound real-time application data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text frame.
    Text(String),
    /// Binary frame.
    Binary(Vec<u8>),
}

impl Frame {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Binary(b) => b.len(),
        }
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
