//! Error types for sync-auth.

use tether_sync_types::{AuthError, CODE_LOCKED, CODE_UNAUTHORIZED};

/// Main error type for authority operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthorityError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Token error.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// Attempt or user store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Password hashing failure.
    #[error("password hash error: {0}")]
    Hash(String),
}

impl From<argon2::password_hash::Error> for AuthorityError {
    fn from(err: argon2::password_hash::Error) -> Self {
        Self::Hash(err.to_string())
    }
}

/// Session token errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Token is not a parseable three-segment token, or its claims are
    /// incomplete.
    #[error("malformed token")]
    Malformed,

    /// Signature does not match the header and claims.
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token is past its validity window.
    #[error("token expired")]
    Expired,

    /// Claims could not be signed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<&TokenError> for AuthError {
    fn from(err: &TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::Expired,
            _ => AuthError::Invalid,
        }
    }
}

/// Login protocol errors.
///
/// Never discloses whether the identifier or the password was wrong.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    /// Too many recent failures for this identifier.
    #[error("too many failed attempts, try again later")]
    LockedOut,

    /// Unknown identifier or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Store, hashing or signing failure.
    #[error(transparent)]
    Authority(#[from] AuthorityError),
}

impl LoginError {
    /// Envelope code an HTTP handler should answer with.
    pub fn code(&self) -> i64 {
        match self {
            Self::LockedOut => CODE_LOCKED,
            Self::InvalidCredentials => CODE_UNAUTHORIZED,
            Self::Authority(_) => 500,
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::LockedOut => "too many failed attempts, try again later",
            Self::InvalidCredentials => "invalid credentials",
            Self::Authority(_) => "internal error",
        }
    }
}

impl From<TokenError> for LoginError {
    fn from(err: TokenError) -> Self {
        Self::Authority(AuthorityError::Token(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_map_to_auth_errors() {
        assert_eq!(AuthError::from(&TokenError::Expired), AuthError::Expired);
        assert_eq!(
            AuthError::from(&TokenError::InvalidSignature),
            AuthError::Invalid
        );
        assert_eq!(AuthError::from(&TokenError::Malformed), AuthError::Invalid);
    }

    #[test]
    fn login_errors_do_not_leak_details() {
        let err = LoginError::Authority(AuthorityError::Store("redis down at 10.0.0.3".into()));
        assert_eq!(err.public_message(), "internal error");
        assert_eq!(err.code(), 500);
        assert_eq!(LoginError::InvalidCredentials.code(), 401);
        assert_eq!(LoginError::LockedOut.code(), 423);
    }
}
