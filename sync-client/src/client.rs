//! TetherClient - the main interface for Tether Sync.
//!
//! This module provides [`TetherClient`], which wires the three client-side
//! components to one shared session token:
//!
//! ```text
//!                  ┌─→ AuthClient ──────────────┐ (stores token)
//! Application → TetherClient                     TokenStore
//!                  ├─→ ConnectionManager ←───────┤ (reads token per handshake)
//!                  └─→ TransferCoordinator ←─────┘ (reads token per call)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tether_sync_client::{ClientConfig, TetherClient};
//!
//! let client = TetherClient::new(ClientConfig::default())?;
//! client.login(&request).await?;
//! client.connect();
//! let report = client.upload(files, "/docs", &CancellationToken::new()).await?;
//! client.shutdown().await;
//! ```

use std::path::Path;

use tether_sync_core::{BatchReport, ConnectionState, FileSource};
use tether_sync_types::{LoginRequest, LoginResponse, SyncError};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::auth::AuthClient;
use crate::bus::MessageBus;
use crate::config::{ClientConfig, ConfigError};
use crate::connection::ConnectionManager;
use crate::token::TokenStore;
use crate::transfer::{BatchError, HttpFileApi, TransferCoordinator, TransferEvent};
use crate::transport::WsTransport;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Operation failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Upload batch stopped because the session was refused.
    #[error(transparent)]
    Batch(BatchError),
}

impl From<BatchError> for ClientError {
    fn from(error: BatchError) -> Self {
        match error {
            BatchError::Rejected(e) => Self::Sync(e),
            aborted => Self::Batch(aborted),
        }
    }
}

/// High-level client: login, real-time connection and uploads.
#[derive(Debug)]
pub struct TetherClient {
    config: ClientConfig,
    tokens: TokenStore,
    auth: AuthClient,
    connection: ConnectionManager<WsTransport, TokenStore>,
    transfers: TransferCoordinator<HttpFileApi, TokenStore>,
}

impl TetherClient {
    /// Build a client from configuration. No network activity happens here.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let tokens = TokenStore::new();
        let auth = AuthClient::new(&config.server.api_base, config.transfer.request_timeout())?;
        let connection = ConnectionManager::new(
            WsTransport::new(config.server.realtime_url.clone()),
            tokens.clone(),
            config.connection.clone(),
        );
        let transfers = TransferCoordinator::new(
            HttpFileApi::from_config(&config)?,
            tokens.clone(),
            config.transfer.conflict_policy,
        );

        Ok(Self {
            config,
            tokens,
            auth,
            connection,
            transfers,
        })
    }

    /// Build a client from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_file(path)?)
    }

    /// Send upload progress to `events`.
    pub fn with_transfer_events(mut self, events: UnboundedSender<TransferEvent>) -> Self {
        self.transfers = self.transfers.with_events(events);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Shared session token slot.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Log in and keep the returned token for later calls.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        let response = self.auth.login(request).await?;
        self.tokens.set(response.token.clone());
        tracing::info!("Logged in as {}", response.user.username);
        Ok(response)
    }

    /// Use a token obtained earlier (e.g. restored from disk).
    pub fn resume_session(&self, token: impl Into<String>) {
        self.tokens.set(token);
    }

    /// Forget the session and drop the real-time connection.
    pub fn logout(&self) {
        self.tokens.clear();
        self.connection.disconnect();
    }

    /// Start the real-time connection. See [`ConnectionManager::connect`].
    pub fn connect(&self) {
        self.connection.connect();
    }

    /// Stop the real-time connection.
    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// The connection manager.
    pub fn connection(&self) -> &ConnectionManager<WsTransport, TokenStore> {
        &self.connection
    }

    /// Bus carrying connection states and inbound frames.
    pub fn bus(&self) -> &MessageBus {
        self.connection.bus()
    }

    /// Upload `files` into `target`. See [`TransferCoordinator::run_batch`].
    pub async fn upload(
        &self,
        files: Vec<FileSource>,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, ClientError> {
        Ok(self.transfers.run_batch(files, target, cancel).await?)
    }

    /// Stop background tasks.
    pub async fn shutdown(&self) {
        self.connection.shutdown().await;
    }
}
