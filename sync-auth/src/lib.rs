//! # sync-auth
//!
//! Credential and session authority for Tether Sync.
//!
//! - [`TokenAuthority`] issues and validates HS256 session tokens.
//! - [`LoginGuard`] counts failed logins per identifier in an
//!   [`AttemptStore`] and locks an identifier out for the rest of the window
//!   once the threshold is reached.
//! - [`LoginService`] runs the login protocol against an external
//!   [`UserStore`].
//! - [`spawn_cleanup_task`] purges expired counters in the background.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tether_sync_auth::{AuthConfig, MemoryAttemptStore, SessionAuthority, SessionClaims};
//!
//! let config = AuthConfig::with_secret("0123456789abcdef0123456789abcdef");
//! let authority = SessionAuthority::from_config(&config, Arc::new(MemoryAttemptStore::new()))?;
//! let token = authority.issue(&SessionClaims {
//!     user_id: "1".into(),
//!     username: "alice".into(),
//!     role: "user".into(),
//! })?;
//! assert!(authority.validate(token.as_str()).is_ok());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod authority;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod lockout;
pub mod login;
pub mod token;

pub use authority::SessionAuthority;
pub use cleanup::spawn_cleanup_task;
pub use config::{AuthConfig, CleanupConfig, ConfigError, LockoutConfig, TokenConfig};
pub use error::{AuthorityError, LoginError, TokenError};
pub use lockout::{
    fingerprint, normalize_identifier, AttemptStore, LockoutPolicy, LoginGuard,
    MemoryAttemptStore,
};
pub use login::{LoginService, MemoryUserStore, UserStore};
pub use token::{SessionClaims, SessionToken, TokenAuthority, VerifiedClaims};
