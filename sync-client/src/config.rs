//! Configuration loading for sync-client.
//!
//! Configuration is loaded from a TOML file (default: `tether.toml`).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tether_sync_core::ReconnectPolicy;

use crate::transfer::ConflictPolicy;

/// Root configuration for the client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Server endpoints.
    #[serde(default)]
    pub server: ServerConfig,
    /// Real-time connection tuning.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// File transfer settings.
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Server endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Real-time WebSocket endpoint (default: ws://127.0.0.1:8080/ws).
    #[serde(default = "default_realtime_url")]
    pub realtime_url: String,
    /// Base URL for HTTP calls (default: http://127.0.0.1:8080/api).
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Real-time connection tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Handshake timeout in seconds (default: 10).
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Keep-alive ping interval in seconds (default: 30).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
    /// Seconds to wait for a pong before failing the link (default: 10).
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,
    /// First reconnect delay in milliseconds (default: 1500).
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    /// Reconnect delay cap in milliseconds (default: 30000).
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// Reconnect attempts before giving up (default: 5).
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

/// File transfer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// Per-request timeout for check and login calls in seconds (default: 30).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// What to do when the destination already exists (default: attempt).
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
}

// Default value functions
fn default_realtime_url() -> String {
    "ws://127.0.0.1:8080/ws".to_string()
}

fn default_api_base() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    10
}

fn default_reconnect_base_ms() -> u64 {
    ReconnectPolicy::DEFAULT_BASE_DELAY.as_millis() as u64
}

fn default_reconnect_max_ms() -> u64 {
    ReconnectPolicy::DEFAULT_MAX_DELAY.as_millis() as u64
}

fn default_max_reconnect_attempts() -> u32 {
    ReconnectPolicy::DEFAULT_MAX_ATTEMPTS
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            realtime_url: default_realtime_url(),
            api_base: default_api_base(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout(),
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

impl ConnectionConfig {
    /// Handshake timeout.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Keep-alive ping interval.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// Pong deadline after each ping.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    /// Reconnect schedule.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect_base_ms),
            max_delay: Duration::from_millis(self.reconnect_max_ms),
            max_attempts: self.max_reconnect_attempts,
        }
    }
}

impl TransferConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClientConfig::default();
        assert_eq!(config.server.realtime_url, "ws://127.0.0.1:8080/ws");
        assert_eq!(config.connection.handshake_timeout(), Duration::from_secs(10));
        assert_eq!(config.connection.ping_interval(), Duration::from_secs(30));
        assert_eq!(config.connection.pong_timeout(), Duration::from_secs(10));
        assert_eq!(config.connection.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(config.transfer.conflict_policy, ConflictPolicy::AttemptAnyway);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
realtime_url = "wss://sync.example.com/ws"
api_base = "https://sync.example.com/api"

[connection]
ping_interval_secs = 15
max_reconnect_attempts = 8

[transfer]
conflict_policy = "skip"
"#;

        let config: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.realtime_url, "wss://sync.example.com/ws");
        assert_eq!(config.server.api_base, "https://sync.example.com/api");
        assert_eq!(config.connection.ping_interval_secs, 15);
        assert_eq!(config.connection.reconnect_policy().max_attempts, 8);
        assert_eq!(config.connection.handshake_timeout_secs, 10);
        assert_eq!(config.transfer.conflict_policy, ConflictPolicy::Skip);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.connection.reconnect_base_ms, 1500);
        assert_eq!(config.connection.reconnect_max_ms, 30_000);
        assert_eq!(config.transfer.request_timeout_secs, 30);
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tether.toml");
        std::fs::write(&path, "[connection]\nping_interval_secs = \"often\"\n").unwrap();
        assert!(matches!(
            ClientConfig::from_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
