//! Signed session tokens.
//!
//! Tokens are HS256-signed JWTs carrying `{sub, username, role, iat, exp}`.
//! Validation checks the shape, then the signature, then the claims, then
//! the expiry, so that any altered byte in a well-shaped token is reported as
//! [`TokenError::InvalidSignature`] rather than as a decoding problem.

use jsonwebtoken::{crypto, decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::TokenError;

/// Identity to embed in a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    /// Stable user identifier (`sub`).
    pub user_id: String,
    /// Display username.
    pub username: String,
    /// Role name.
    pub role: String,
}

/// Claims recovered from a valid token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// The embedded identity.
    pub claims: SessionClaims,
    /// Issue time (Unix seconds).
    pub issued_at: i64,
    /// Expiry time (Unix seconds).
    pub expires_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    username: String,
    role: String,
    iat: i64,
    exp: i64,
}

/// An issued token. Immutable.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    token: String,
    expires_at: i64,
}

impl SessionToken {
    /// The encoded token string.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Expiry time (Unix seconds).
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Take the encoded string.
    pub fn into_string(self) -> String {
        self.token
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("token", &format!("[{} chars REDACTED]", self.token.len()))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Issues and validates session tokens with one HMAC secret.
#[derive(Clone)]
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenAuthority {
    /// Create an authority signing with `secret`, issuing tokens valid for `ttl`.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token valid from now.
    pub fn issue(&self, claims: &SessionClaims) -> Result<SessionToken, TokenError> {
        self.issue_at(claims, unix_now())
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    pub fn issue_at(&self, claims: &SessionClaims, now: i64) -> Result<SessionToken, TokenError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let wire = WireClaims {
            sub: claims.user_id.clone(),
            username: claims.username.clone(),
            role: claims.role.clone(),
            iat: now,
            exp: now.saturating_add(ttl),
        };

        let token = encode(&Header::new(Algorithm::HS256), &wire, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(SessionToken {
            token,
            expires_at: wire.exp,
        })
    }

    /// Validate a token against the current time.
    pub fn validate(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        self.validate_at(token, unix_now())
    }

    /// Validate a token as if the current time were `now` (Unix seconds).
    ///
    /// Side-effect-free.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<VerifiedClaims, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
            return Err(TokenError::Malformed);
        }

        let signed_len = segments[0].len() + 1 + segments[1].len();
        let verified = crypto::verify(
            segments[2],
            token[..signed_len].as_bytes(),
            &self.decoding,
            Algorithm::HS256,
        )
        .unwrap_or(false);
        if !verified {
            return Err(TokenError::InvalidSignature);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<WireClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;
        let wire = data.claims;

        if now > wire.exp {
            return Err(TokenError::Expired);
        }

        Ok(VerifiedClaims {
            claims: SessionClaims {
                user_id: wire.sub,
                username: wire.username,
                role: wire.role,
            },
            issued_at: wire.iat,
            expires_at: wire.exp,
        })
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
