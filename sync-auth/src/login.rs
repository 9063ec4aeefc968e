//! Login protocol.
//!
//! [`LoginService`] orchestrates one login: lockout check, credential
//! verification against a [`UserStore`], then either a recorded failure or a
//! cleared counter plus a fresh token. Every rejection that is not a lockout
//! is the same generic "invalid credentials" error.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Argon2, Params};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use tether_sync_types::{LoginIdentifier, LoginRequest, LoginResponse, UserProfile};

use crate::authority::SessionAuthority;
use crate::error::{AuthorityError, LoginError};
use crate::lockout::{fingerprint, normalize_identifier};
use crate::token::SessionClaims;

/// External user directory.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Check a password for an identifier.
    ///
    /// Returns the profile on a match and `None` for an unknown identifier or
    /// a wrong password. Implementations should take the same time in both
    /// cases.
    async fn verify_credentials(
        &self,
        identifier: &LoginIdentifier,
        password: &str,
    ) -> Result<Option<UserProfile>, AuthorityError>;
}

#[derive(Debug, Clone)]
struct UserRecord {
    profile: UserProfile,
    email: Option<String>,
    phone: Option<String>,
    password_hash: String,
}

impl UserRecord {
    fn matches(&self, identifier: &LoginIdentifier) -> bool {
        let wanted = normalize_identifier(identifier.value());
        let field = match identifier {
            LoginIdentifier::Username(_) => Some(&self.profile.username),
            LoginIdentifier::Email(_) => self.email.as_ref(),
            LoginIdentifier::Phone(_) => self.phone.as_ref(),
        };
        field.is_some_and(|v| normalize_identifier(v) == wanted)
    }
}

/// In-memory user directory with Argon2id password hashes.
pub struct MemoryUserStore {
    users: DashMap<String, UserRecord>,
    hasher: Argon2<'static>,
    dummy_hash: String,
}

impl std::fmt::Debug for MemoryUserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryUserStore")
            .field("users", &self.users.len())
            .finish()
    }
}

impl MemoryUserStore {
    /// Create an empty store with default Argon2id parameters.
    pub fn new() -> Result<Self, AuthorityError> {
        Self::with_params(Params::default())
    }

    /// Create an empty store with explicit Argon2id parameters.
    pub fn with_params(params: Params) -> Result<Self, AuthorityError> {
        let hasher = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
        let dummy_hash = hash_with(&hasher, "tether-dummy-password")?;
        Ok(Self {
            users: DashMap::new(),
            hasher,
            dummy_hash,
        })
    }

    /// Add a user. Replaces an existing user with the same id.
    pub fn add_user(
        &self,
        profile: UserProfile,
        email: Option<&str>,
        phone: Option<&str>,
        password: &str,
    ) -> Result<(), AuthorityError> {
        let password_hash = hash_with(&self.hasher, password)?;
        self.users.insert(
            profile.id.clone(),
            UserRecord {
                profile,
                email: email.map(str::to_string),
                phone: phone.map(str::to_string),
                password_hash,
            },
        );
        Ok(())
    }

    /// Number of users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the store has no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn verify_credentials(
        &self,
        identifier: &LoginIdentifier,
        password: &str,
    ) -> Result<Option<UserProfile>, AuthorityError> {
        let record = self
            .users
            .iter()
            .find(|r| r.matches(identifier))
            .map(|r| r.value().clone());

        // Unknown users still pay for one verification.
        let hash = record
            .as_ref()
            .map_or(self.dummy_hash.as_str(), |r| r.password_hash.as_str());
        let matched = verify_with(&self.hasher, password, hash)?;

        Ok(record.filter(|_| matched).map(|r| r.profile))
    }
}

fn hash_with(hasher: &Argon2<'_>, password: &str) -> Result<String, AuthorityError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_with(hasher: &Argon2<'_>, password: &str, hash: &str) -> Result<bool, AuthorityError> {
    let parsed = PasswordHash::new(hash)?;
    match hasher.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Runs the login protocol.
#[derive(Clone)]
pub struct LoginService {
    authority: SessionAuthority,
    users: Arc<dyn UserStore>,
}

impl std::fmt::Debug for LoginService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginService")
            .field("authority", &self.authority)
            .field("users", &"dyn UserStore")
            .finish()
    }
}

impl LoginService {
    /// Create a login service.
    pub fn new(authority: SessionAuthority, users: Arc<dyn UserStore>) -> Self {
        Self { authority, users }
    }

    /// The authority this service issues tokens from.
    pub fn authority(&self) -> &SessionAuthority {
        &self.authority
    }

    /// Attempt a login.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, LoginError> {
        let key = request.identifier.normalized();

        if self.authority.is_locked_out(&key).await? {
            tracing::info!("Login rejected for {}: locked out", fingerprint(&key));
            return Err(LoginError::LockedOut);
        }

        let user = self
            .users
            .verify_credentials(&request.identifier, &request.password)
            .await?;

        let Some(user) = user else {
            let failures = self.authority.record_failure(&key).await?;
            tracing::info!(
                "Login failed for {} ({} recent failures)",
                fingerprint(&key),
                failures
            );
            return Err(LoginError::InvalidCredentials);
        };

        self.authority.clear(&key).await?;
        let token = self.authority.issue(&SessionClaims {
            user_id: user.id.clone(),
            username: user.username.clone(),
            role: user.role.clone(),
        })?;

        tracing::info!("Login succeeded for {}", fingerprint(&key));
        Ok(LoginResponse {
            token: token.into_string(),
            user,
        })
    }
}
