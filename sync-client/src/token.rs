//! Session token source.
//!
//! The connection manager and the transfer coordinator ask a [`TokenSource`]
//! for the current session token before every handshake and every call, so a
//! re-login is picked up without rebuilding either of them.

use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};

/// Supplies the current session token.
#[async_trait]
pub trait TokenSource: Send + Sync + 'static {
    /// The token to present, or `None` when not logged in.
    async fn token(&self) -> Option<String>;
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn token(&self) -> Option<String> {
        (**self).token().await
    }
}

/// In-memory token holder shared between components.
///
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = self.get().is_some();
        f.debug_struct("TokenStore")
            .field("token", &if present { "[REDACTED]" } else { "none" })
            .finish()
    }
}

impl TokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `token`.
    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set(token);
        store
    }

    /// Replace the token.
    pub fn set(&self, token: impl Into<String>) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(token.into());
    }

    /// Forget the token.
    pub fn clear(&self) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    /// Current token.
    pub fn get(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TokenSource for TokenStore {
    async fn token(&self) -> Option<String> {
        self.get().filter(|t| !t.is_empty())
    }
}
