//! Configuration loading for sync-auth.
//!
//! Configuration is loaded from a TOML file (default: `authority.toml`).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Minimum accepted signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Root configuration for the authority.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Token signing configuration.
    pub token: TokenConfig,
    /// Failed-login lockout configuration.
    #[serde(default)]
    pub lockout: LockoutConfig,
    /// Counter cleanup configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Token signing configuration.
#[derive(Clone, Deserialize)]
pub struct TokenConfig {
    /// HMAC-SHA256 signing secret.
    pub secret: String,
    /// Token lifetime in seconds (default: 86400 = 24 hours).
    #[serde(default = "default_token_ttl")]
    pub ttl_secs: u64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &format!("[{} bytes REDACTED]", self.secret.len()))
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

/// Failed-login lockout configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    /// Failures that lock an identifier (default: 5).
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    /// Lockout window in seconds (default: 300 = 5 minutes).
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Cleanup interval in seconds (default: 60).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_token_ttl() -> u64 {
    24 * 60 * 60 // 24 hours
}

fn default_max_failures() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    5 * 60 // 5 minutes
}

fn default_cleanup_interval() -> u64 {
    60
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl TokenConfig {
    /// Token config with the default lifetime.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs: default_token_ttl(),
        }
    }

    /// Token lifetime.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl LockoutConfig {
    /// Lockout window.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl AuthConfig {
    /// Config with default lockout and cleanup settings.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            token: TokenConfig::new(secret),
            lockout: LockoutConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "token.secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.token.ttl_secs == 0 {
            return Err(ConfigError::Invalid("token.ttl_secs must be > 0".into()));
        }
        if self.lockout.max_failures == 0 {
            return Err(ConfigError::Invalid(
                "lockout.max_failures must be > 0".into(),
            ));
        }
        if self.cleanup.enabled && self.cleanup.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "cleanup.interval_secs must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Parsed values are unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
