//! Failed-login lockout.
//!
//! Failures are counted per normalized identifier in an [`AttemptStore`].
//! The store must increment atomically and attach the time-to-live when a
//! counter is created, so two concurrent failures never under-count and a
//! counter disappears on its own once the window has passed.
//!
//! [`MemoryAttemptStore`] is the in-process implementation. A shared store
//! (Redis `INCR` + `EXPIRE`, a SQL upsert) plugs in through the same trait.

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::LockoutConfig;
use crate::error::AuthorityError;

/// Storage for login attempt counters.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Atomically increment the counter for `key` and return the new count.
    ///
    /// Creates the counter with `ttl` if it is absent or expired. The TTL of
    /// an existing counter is not extended.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u32, AuthorityError>;

    /// Current count for `key` (0 when absent or expired).
    async fn count(&self, key: &str) -> Result<u32, AuthorityError>;

    /// Delete the counter for `key`.
    async fn remove(&self, key: &str) -> Result<(), AuthorityError>;

    /// Drop expired counters. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, AuthorityError>;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u32,
    expires_at: Instant,
}

impl Counter {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory attempt store backed by DashMap.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    counters: DashMap<String, Counter>,
}

impl MemoryAttemptStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of counters held, expired ones included.
    pub fn tracked(&self) -> usize {
        self.counters.len()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn increment(&self, key: &str, ttl: Duration) -> Result<u32, AuthorityError> {
        let now = Instant::now();
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: now + ttl,
        });
        if !entry.is_live(now) {
            *entry = Counter {
                count: 0,
                expires_at: now + ttl,
            };
        }
        entry.count = entry.count.saturating_add(1);
        Ok(entry.count)
    }

    async fn count(&self, key: &str) -> Result<u32, AuthorityError> {
        let now = Instant::now();
        Ok(self
            .counters
            .get(key)
            .filter(|c| c.is_live(now))
            .map_or(0, |c| c.count))
    }

    async fn remove(&self, key: &str) -> Result<(), AuthorityError> {
        self.counters.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, AuthorityError> {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, c| c.is_live(now));
        Ok(before.saturating_sub(self.counters.len()))
    }
}

/// Lockout thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures that lock an identifier.
    pub max_failures: u32,
    /// How long a counter lives after its first failure.
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from(&LockoutConfig::default())
    }
}

impl From<&LockoutConfig> for LockoutPolicy {
    fn from(config: &LockoutConfig) -> Self {
        Self {
            max_failures: config.max_failures,
            window: config.window(),
        }
    }
}

/// Lockout key for an identifier: trimmed and lower-cased.
pub fn normalize_identifier(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

/// Short, stable fingerprint of an identifier for log lines.
pub fn fingerprint(identifier: &str) -> String {
    let digest = Sha256::digest(normalize_identifier(identifier).as_bytes());
    hex::encode(&digest[..6])
}

/// Applies a [`LockoutPolicy`] over an [`AttemptStore`].
#[derive(Clone)]
pub struct LoginGuard {
    store: Arc<dyn AttemptStore>,
    policy: LockoutPolicy,
}

impl std::fmt::Debug for LoginGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginGuard")
            .field("store", &"dyn AttemptStore")
            .field("policy", &self.policy)
            .finish()
    }
}

impl LoginGuard {
    /// Create a guard.
    pub fn new(store: Arc<dyn AttemptStore>, policy: LockoutPolicy) -> Self {
        Self { store, policy }
    }

    /// The policy in force.
    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn AttemptStore> {
        &self.store
    }

    /// Record a failed login. Returns the failure count inside the window.
    pub async fn record_failure(&self, identifier: &str) -> Result<u32, AuthorityError> {
        let key = normalize_identifier(identifier);
        let count = self.store.increment(&key, self.policy.window).await?;
        if count == self.policy.max_failures {
            tracing::warn!(
                "Identifier {} locked out after {} failures",
                fingerprint(&key),
                count
            );
        } else {
            tracing::debug!("Identifier {} failure {}", fingerprint(&key), count);
        }
        Ok(count)
    }

    /// Whether logins for `identifier` are currently rejected.
    pub async fn is_locked_out(&self, identifier: &str) -> Result<bool, AuthorityError> {
        let key = normalize_identifier(identifier);
        Ok(self.store.count(&key).await? >= self.policy.max_failures)
    }

    /// Forget failures for `identifier` (after a successful login).
    pub async fn clear(&self, identifier: &str) -> Result<(), AuthorityError> {
        self.store.remove(&normalize_identifier(identifier)).await
    }
}
