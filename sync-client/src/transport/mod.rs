//! Transport abstraction for the real-time channel.
//!
//! This module provides a pluggable transport layer that abstracts
//! the underlying connection mechanism (WebSocket, mock for testing).
//!
//! # Design
//!
//! A [`Transport`] opens connections; each [`Connection`] is owned by exactly
//! one link task in the connection manager:
//! - `open()` performs the handshake, presenting the session token
//! - `recv()` yields application frames, pongs and the peer's close
//! - `ping()` sends a keep-alive ping
//! - `close()` gracefully terminates
//!
//! # Example
//!
//! ```ignore
//! let transport = MockTransport::new();
//! let mut conn = transport.open("token").await?;
//! transport.push_text("hello");
//! let inbound = conn.recv().await?;
//! ```

mod mock;
mod ws;

pub use mock::{MockConnection, MockTransport};
pub use ws::{WsConnection, WsTransport};

use async_trait::async_trait;
use tether_sync_types::Frame;
use thiserror::Error;

/// Close code reported when the stream ends without a close frame.
pub const ABNORMAL_CLOSE: u16 = 1006;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Server refused the session token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

/// Something read from a live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Application data.
    Frame(Frame),
    /// Answer to a keep-alive ping.
    Pong,
    /// Peer closed the connection.
    Closed {
        /// WebSocket close code.
        code: u16,
        /// Close reason text.
        reason: String,
    },
}

/// Opens real-time connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connection type produced by [`open`](Self::open).
    type Connection: Connection;

    /// Perform the handshake, presenting `token`.
    ///
    /// Returns [`TransportError::Unauthorized`] when the server rejects the
    /// token, so the caller can stop retrying.
    async fn open(&self, token: &str) -> Result<Self::Connection, TransportError>;
}

/// One live connection.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Wait for the next inbound item.
    ///
    /// Must be cancel-safe: dropping the future must not lose a frame that
    /// was already read.
    async fn recv(&mut self) -> Result<Inbound, TransportError>;

    /// Send a keep-alive ping.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}
