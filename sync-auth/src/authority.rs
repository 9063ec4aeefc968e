//! The session authority facade.

use std::sync::Arc;

use crate::config::{AuthConfig, ConfigError};
use crate::error::{AuthorityError, TokenError};
use crate::lockout::{AttemptStore, LockoutPolicy, LoginGuard};
use crate::token::{SessionClaims, SessionToken, TokenAuthority, VerifiedClaims};

/// Issues and validates tokens and tracks failed logins.
///
/// Cheap to clone; clones share the attempt store.
#[derive(Debug, Clone)]
pub struct SessionAuthority {
    tokens: TokenAuthority,
    guard: LoginGuard,
}

impl SessionAuthority {
    /// Assemble an authority from its parts.
    pub fn new(tokens: TokenAuthority, guard: LoginGuard) -> Self {
        Self { tokens, guard }
    }

    /// Build an authority from validated configuration.
    pub fn from_config(
        config: &AuthConfig,
        store: Arc<dyn AttemptStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let tokens = TokenAuthority::new(config.token.secret.as_bytes(), config.token.ttl());
        let guard = LoginGuard::new(store, LockoutPolicy::from(&config.lockout));
        Ok(Self::new(tokens, guard))
    }

    /// Sign `claims` with the configured validity window.
    pub fn issue(&self, claims: &SessionClaims) -> Result<SessionToken, TokenError> {
        self.tokens.issue(claims)
    }

    /// Verify a token string.
    pub fn validate(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        self.tokens.validate(token)
    }

    /// Count a failed login for `identifier`.
    pub async fn record_failure(&self, identifier: &str) -> Result<u32, AuthorityError> {
        self.guard.record_failure(identifier).await
    }

    /// Whether `identifier` is locked out.
    pub async fn is_locked_out(&self, identifier: &str) -> Result<bool, AuthorityError> {
        self.guard.is_locked_out(identifier).await
    }

    /// Delete the failure counter for `identifier`.
    pub async fn clear(&self, identifier: &str) -> Result<(), AuthorityError> {
        self.guard.clear(identifier).await
    }

    /// Token half of the authority.
    pub fn tokens(&self) -> &TokenAuthority {
        &self.tokens
    }

    /// Lockout half of the authority.
    pub fn guard(&self) -> &LoginGuard {
        &self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockout::MemoryAttemptStore;

    #[test]
    fn from_config_rejects_weak_secret() {
        let result = SessionAuthority::from_config(
            &AuthConfig::with_secret("weak"),
            Arc::new(MemoryAttemptStore::new()),
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn facade_delegates() {
        let authority = SessionAuthority::from_config(
            &AuthConfig::with_secret("0123456789abcdef0123456789abcdef"),
            Arc::new(MemoryAttemptStore::new()),
        )
        .unwrap();

        let claims = SessionClaims {
            user_id: "7".into(),
            username: "eve".into(),
            role: "user".into(),
        };
        let token = authority.issue(&claims).unwrap();
        assert_eq!(authority.validate(token.as_str()).unwrap().claims, claims);
        assert_eq!(authority.tokens().ttl().as_secs(), 86_400);

        for _ in 0..5 {
            authority.record_failure("eve").await.unwrap();
        }
        assert!(authority.is_locked_out("eve").await.unwrap());
        authority.clear("eve").await.unwrap();
        assert!(!authority.is_locked_out("eve").await.unwrap());
    }
}
