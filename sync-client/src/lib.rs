//! # sync-client
//!
//! Client library for the Tether Sync channel.
//!
//! This is the library applications use to stay connected to the central
//! service and to push files to it.
//!
//! ## Features
//!
//! - **Resilient connection**: one real-time WebSocket with capped exponential
//!   backoff, keep-alive and explicit disconnect
//! - **Message bus**: latest-value fan-out of connection states and inbound frames
//! - **Batch uploads**: ordered transfers with existence checks and progress
//! - **Pure state machine**: connection logic lives in sync-core, side-effect free
//!
//! ## Example
//!
//! ```ignore
//! use tether_sync_client::{ClientConfig, TetherClient};
//!
//! let client = TetherClient::new(ClientConfig::default())?;
//! client.login(&request).await?;
//! client.connect();
//!
//! let mut states = client.connection().subscribe_state();
//! while let Some(state) = states.next().await {
//!     println!("{state}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod api;
pub mod auth;
pub mod bus;
pub mod client;
pub mod config;
pub mod connection;
pub mod token;
pub mod transfer;
pub mod transport;

pub use auth::AuthClient;
pub use bus::{InboundFrame, MessageBus};
pub use client::{ClientError, TetherClient};
pub use config::{ClientConfig, ConfigError, ConnectionConfig, ServerConfig, TransferConfig};
pub use connection::{ConnectionManager, REASON_KEEPALIVE_TIMEOUT};
pub use token::{TokenSource, TokenStore};
pub use transfer::{
    BatchError, ConflictPolicy, FileApi, HttpFileApi, MockFileApi, ProgressFn, TransferCoordinator,
    TransferEvent, UploadCall, UploadRequest,
};
pub use transport::{
    Connection, Inbound, MockConnection, MockTransport, Transport, TransportError, WsConnection,
    WsTransport,
};
