//! Connection manager for the real-time channel.
//!
//! [`ConnectionManager`] owns exactly one logical connection at a time. It
//! feeds events into the pure [`ConnectionMachine`] from sync-core and
//! interprets the resulting actions:
//!
//! ```text
//! connect()/disconnect() ─┐
//! link task events ───────┼─→ ConnectionMachine ─→ actions ─→ spawn link / timer,
//! reconnect timer ────────┘    (under one lock)               close, publish on bus
//! ```
//!
//! Every transition and its actions run under a single mutex, so transitions
//! are totally ordered and two racing `connect()` calls produce a single
//! handshake. `connect()` and `disconnect()` never block: network work happens
//! in spawned link tasks, each tagged with the epoch of its attempt.
//!
//! # Example
//!
//! ```ignore
//! let manager = ConnectionManager::new(WsTransport::new(url), tokens, config);
//! manager.connect();
//! let mut states = manager.subscribe_state();
//! while let Some(state) = states.next().await {
//!     println!("{state}");
//! }
//! manager.shutdown().await;
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tether_sync_core::{Action, ConnectionMachine, ConnectionState, Event};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use crate::bus::{InboundFrame, MessageBus};
use crate::config::ConnectionConfig;
use crate::token::TokenSource;
use crate::transport::{Connection, Inbound, Transport, TransportError};

/// Reason published when no pong arrives in time.
pub const REASON_KEEPALIVE_TIMEOUT: &str = "keep-alive timeout";

/// Manages the single real-time connection.
///
/// Cloning yields another handle to the same manager. Must be used from
/// within a Tokio runtime. Call [`shutdown`](Self::shutdown) to stop all
/// background tasks.
pub struct ConnectionManager<T: Transport, S: TokenSource> {
    shared: Arc<Shared<T, S>>,
}

struct Shared<T, S> {
    transport: T,
    tokens: S,
    config: ConnectionConfig,
    bus: MessageBus,
    control: Mutex<Control>,
}

struct Control {
    machine: ConnectionMachine,
    link: Option<Link>,
    reconnect: Option<CancellationToken>,
}

/// A spawned link task and the token that stops it.
struct Link {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl<T: Transport, S: TokenSource> Clone for ConnectionManager<T, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport, S: TokenSource> std::fmt::Debug for ConnectionManager<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl<T: Transport, S: TokenSource> ConnectionManager<T, S> {
    /// Create a manager in the `Disconnected` state with its own bus.
    pub fn new(transport: T, tokens: S, config: ConnectionConfig) -> Self {
        Self::with_bus(transport, tokens, config, MessageBus::new())
    }

    /// Create a manager publishing on an existing bus.
    pub fn with_bus(transport: T, tokens: S, config: ConnectionConfig, bus: MessageBus) -> Self {
        let machine = ConnectionMachine::new(config.reconnect_policy());
        bus.publish_state(machine.state().clone());
        Self {
            shared: Arc::new(Shared {
                transport,
                tokens,
                config,
                bus,
                control: Mutex::new(Control {
                    machine,
                    link: None,
                    reconnect: None,
                }),
            }),
        }
    }

    /// Start connecting. No-op while connecting or connected.
    ///
    /// Returns immediately; progress is observable on the bus.
    pub fn connect(&self) {
        self.shared.apply(Event::ConnectRequested);
    }

    /// Stop reconnecting, close the live connection and publish
    /// `Disconnected`.
    pub fn disconnect(&self) {
        self.shared.apply(Event::DisconnectRequested);
    }

    /// Disconnect and wait for the link task to finish.
    pub async fn shutdown(&self) {
        self.disconnect();
        let link = self.shared.lock().link.take();
        if let Some(link) = link {
            link.cancel.cancel();
            let _ = link.task.await;
        }
        tracing::debug!("Connection manager shut down");
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.bus.state()
    }

    /// Retries scheduled since the last successful handshake.
    pub fn reconnect_attempt(&self) -> u32 {
        self.shared.lock().machine.attempt()
    }

    /// Whether a failure now would be followed by a reconnect attempt.
    ///
    /// False after `disconnect()`, auth failures and exhausted retries.
    pub fn will_reconnect(&self) -> bool {
        self.shared.lock().machine.should_reconnect()
    }

    /// The bus this manager publishes on.
    pub fn bus(&self) -> &MessageBus {
        &self.shared.bus
    }

    /// Stream of connection states, current one first.
    pub fn subscribe_state(&self) -> WatchStream<ConnectionState> {
        self.shared.bus.subscribe_state()
    }

    /// Stream of inbound frames, latest one first.
    pub fn subscribe_frames(&self) -> impl Stream<Item = InboundFrame> + Send + Unpin + 'static {
        self.shared.bus.subscribe_frames()
    }
}

impl<T: Transport, S: TokenSource> Shared<T, S> {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one event and execute its actions before releasing the lock.
    fn apply(self: &Arc<Self>, event: Event) {
        let mut control = self.lock();
        let (machine, actions) = control.machine.clone().on_event(event);
        control.machine = machine;
        for action in actions {
            self.execute(&mut control, action);
        }
    }

    fn execute(self: &Arc<Self>, control: &mut Control, action: Action) {
        match action {
            Action::Open { epoch } => {
                let previous = control.link.take();
                if let Some(previous) = &previous {
                    previous.cancel.cancel();
                }
                let cancel = CancellationToken::new();
                let task = tokio::spawn(Arc::clone(self).run_link(epoch, cancel.clone(), previous));
                control.link = Some(Link { cancel, task });
            }
            Action::Close => {
                if let Some(link) = &control.link {
                    link.cancel.cancel();
                }
            }
            Action::ScheduleReconnect {
                epoch,
                attempt,
                delay,
            } => {
                if let Some(stale) = control.reconnect.take() {
                    stale.cancel();
                }
                let cancel = CancellationToken::new();
                control.reconnect = Some(cancel.clone());
                tracing::info!("Reconnect attempt {} in {:?}", attempt, delay);

                let shared = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sleep(delay) => {
                            // Checked again at fire time; the machine also
                            // drops timers from an older epoch.
                            if !cancel.is_cancelled() {
                                shared.apply(Event::ReconnectTimerFired { epoch });
                            }
                        }
                    }
                });
            }
            Action::CancelReconnect => {
                if let Some(timer) = control.reconnect.take() {
                    timer.cancel();
                }
            }
            Action::Publish(state) => {
                tracing::debug!("Connection state: {}", state);
                self.bus.publish_state(state);
            }
        }
    }

    /// One connection attempt and, if it succeeds, its read loop.
    async fn run_link(
        self: Arc<Self>,
        epoch: u64,
        cancel: CancellationToken,
        previous: Option<Link>,
    ) {
        // The previous link closes its connection before exiting.
        if let Some(previous) = previous {
            let _ = previous.task.await;
        }
        if cancel.is_cancelled() {
            return;
        }

        let token = tokio::select! {
            _ = cancel.cancelled() => return,
            token = self.tokens.token() => token,
        };
        let Some(token) = token else {
            tracing::warn!("No session token available, not connecting");
            self.apply(Event::TokenUnavailable { epoch });
            return;
        };

        tracing::info!("Connecting (attempt epoch {})", epoch);
        let handshake = timeout(self.config.handshake_timeout(), self.transport.open(&token));
        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = handshake => opened,
        };

        let mut conn = match opened {
            Ok(Ok(conn)) => conn,
            Ok(Err(e @ TransportError::Unauthorized(_))) => {
                tracing::warn!("Handshake rejected: {}", e);
                self.apply(Event::AuthRejected {
                    epoch,
                    reason: e.to_string(),
                });
                return;
            }
            Ok(Err(e)) => {
                tracing::warn!("Handshake failed: {}", e);
                self.apply(Event::HandshakeFailed {
                    epoch,
                    reason: e.to_string(),
                });
                return;
            }
            Err(_) => {
                tracing::warn!("Handshake timed out");
                self.apply(Event::HandshakeFailed {
                    epoch,
                    reason: TransportError::Timeout.to_string(),
                });
                return;
            }
        };

        if cancel.is_cancelled() {
            self.close_connection(&mut conn).await;
            return;
        }

        tracing::info!("Connected");
        self.apply(Event::HandshakeSucceeded { epoch });

        let outcome = self.pump(&mut conn, &cancel, epoch).await;
        // The outcome must not wait on a peer that never finishes closing.
        if let Some(event) = outcome {
            self.apply(event);
        }
        self.close_connection(&mut conn).await;
    }

    /// Close `conn`, giving up after the handshake timeout.
    ///
    /// A connection that does not close in time is dropped by the caller.
    async fn close_connection(&self, conn: &mut T::Connection) {
        let limit = self.config.handshake_timeout();
        match timeout(limit, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Close failed: {}", e),
            Err(_) => tracing::warn!("Close did not finish within {:?}, dropping connection", limit),
        }
    }

    /// Read frames and keep the connection alive until it ends or is cancelled.
    ///
    /// Returns the event describing how the connection ended, or `None` when
    /// it was cancelled locally.
    async fn pump(
        &self,
        conn: &mut T::Connection,
        cancel: &CancellationToken,
        epoch: u64,
    ) -> Option<Event> {
        enum Step {
            Cancelled,
            Received(Result<Inbound, TransportError>),
            Ping,
            PongOverdue,
        }

        let every = self.config.ping_interval();
        let mut pings = interval_at(Instant::now() + every, every);
        pings.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pong_deadline: Option<Instant> = None;

        loop {
            let deadline = pong_deadline;
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                received = conn.recv() => Step::Received(received),
                _ = pings.tick() => Step::Ping,
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    Step::PongOverdue
                }
            };

            match step {
                Step::Cancelled => return None,
                Step::Received(Ok(Inbound::Frame(frame))) => {
                    let len = frame.len();
                    let sequence = self.bus.publish_frame(frame);
                    tracing::trace!("Frame {} ({} bytes)", sequence, len);
                }
                Step::Received(Ok(Inbound::Pong)) => pong_deadline = None,
                Step::Received(Ok(Inbound::Closed { code, reason })) => {
                    tracing::info!("Peer closed connection ({}): {}", code, reason);
                    return Some(Event::PeerClosed {
                        epoch,
                        code,
                        reason,
                    });
                }
                Step::Received(Err(e)) => {
                    tracing::warn!("Connection failed: {}", e);
                    return Some(Event::TransportFailed {
                        epoch,
                        reason: e.to_string(),
                    });
                }
                Step::Ping => {
                    if let Err(e) = conn.ping().await {
                        return Some(Event::TransportFailed {
                            epoch,
                            reason: e.to_string(),
                        });
                    }
                    if pong_deadline.is_none() {
                        pong_deadline = Some(Instant::now() + self.config.pong_timeout());
                    }
                }
                Step::PongOverdue => {
                    tracing::warn!("No pong within {:?}", self.config.pong_timeout());
                    return Some(Event::TransportFailed {
                        epoch,
                        reason: REASON_KEEPALIVE_TIMEOUT.to_string(),
                    });
                }
            }
        }
    }
}
