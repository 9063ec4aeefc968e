//! Error types for Tether Sync.
//!
//! Every variant carries owned, comparable data so an error can be stored
//! inside a job status and cloned out to observers.

use thiserror::Error;

/// Authentication failures. Never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No session token is available.
    #[error("no session token")]
    Missing,
    /// Token or credentials were rejected.
    #[error("invalid credentials")]
    Invalid,
    /// Token is past its validity window.
    #[error("session expired")]
    Expired,
    /// Too many failed logins for this identifier.
    #[error("too many failed attempts, try again later")]
    LockedOut,
}

/// File-level failures. Reported per file, never abort a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FileError {
    /// Source or destination does not exist.
    #[error("file not found")]
    NotFound,
    /// Destination is already occupied.
    #[error("file already exists")]
    Exists,
    /// Caller may not read the source or write the destination.
    #[error("permission denied")]
    PermissionDenied,
    /// Destination storage is full.
    #[error("no space left on destination")]
    DiskFull,
}

/// Errors that can occur in Tether Sync operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Transport failure or timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Session is missing or invalid.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// File-level failure.
    #[error("file error: {0}")]
    File(#[from] FileError),

    /// 5xx-class server failure.
    #[error("server error ({status}): {message}")]
    Server {
        /// Status or envelope code reported by the server.
        status: u16,
        /// Server-supplied message.
        message: String,
    },

    /// Caller passed an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Response did not match the wire format.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local failure that fits nowhere else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Map a server status (HTTP status or envelope `code`) to an error.
    ///
    /// Returns `None` for success codes.
    pub fn from_status(status: u16, message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        match status {
            0 | 200..=299 => None,
            401 => Some(Self::Auth(AuthError::Invalid)),
            403 => Some(Self::File(FileError::PermissionDenied)),
            404 => Some(Self::File(FileError::NotFound)),
            409 => Some(Self::File(FileError::Exists)),
            423 | 429 => Some(Self::Auth(AuthError::LockedOut)),
            507 => Some(Self::File(FileError::DiskFull)),
            500..=599 => Some(Self::Server { status, message }),
            _ => Some(Self::Protocol(format!("unexpected status {status}: {message}"))),
        }
    }

    /// Whether the connection layer may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { .. })
    }

    /// Whether the session itself is invalid and the user must log in again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => Self::File(FileError::NotFound),
            ErrorKind::PermissionDenied => Self::File(FileError::PermissionDenied),
            ErrorKind::TimedOut
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Self::Network(err.to_string()),
            // ENOSPC
            _ if err.raw_os_error() == Some(28) => Self::File(FileError::DiskFull),
            _ => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::File(FileError::Exists);
        assert_eq!(err.to_string(), "file error: file already exists");

        let err = SyncError::Server {
            status: 503,
            message: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "server error (503): maintenance");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }

    #[test]
    fn success_codes_map_to_none() {
        assert_eq!(SyncError::from_status(0, "ok"), None);
        assert_eq!(SyncError::from_status(200, "ok"), None);
        assert_eq!(SyncError::from_status(204, ""), None);
    }

    #[test]
    fn failure_codes_map_to_taxonomy() {
        assert_eq!(
            SyncError::from_status(401, "bad token"),
            Some(SyncError::Auth(AuthError::Invalid))
        );
        assert_eq!(
            SyncError::from_status(423, "locked"),
            Some(SyncError::Auth(AuthError::LockedOut))
        );
        assert_eq!(
            SyncError::from_status(409, "exists"),
            Some(SyncError::File(FileError::Exists))
        );
        assert_eq!(
            SyncError::from_status(507, "full"),
            Some(SyncError::File(FileError::DiskFull))
        );
        assert!(matches!(
            SyncError::from_status(502, "bad gateway"),
            Some(SyncError::Server { status: 502, .. })
        ));
        assert!(matches!(
            SyncError::from_status(418, "teapot"),
            Some(SyncError::Protocol(_))
        ));
    }

    #[test]
    fn retry_and_reauth_classification() {
        assert!(SyncError::Network("reset".into()).is_retryable());
        assert!(SyncError::Server {
            status: 500,
            message: String::new()
        }
        .is_retryable());
        assert!(!SyncError::Auth(AuthError::Expired).is_retryable());
        assert!(SyncError::Auth(AuthError::Expired).requires_reauth());
        assert!(!SyncError::File(FileError::NotFound).requires_reauth());
    }

    #[test]
    fn io_errors_map_to_file_errors() {
        let not_found = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(
            SyncError::from(not_found),
            SyncError::File(FileError::NotFound)
        );

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert_eq!(
            SyncError::from(denied),
            SyncError::File(FileError::PermissionDenied)
        );

        let full = std::io::Error::from_raw_os_error(28);
        assert_eq!(SyncError::from(full), SyncError::File(FileError::DiskFull));
    }
}
