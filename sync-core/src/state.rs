//! Connection state machine for Tether Sync.
//!
//! This module provides a pure, side-effect-free state machine for managing
//! the lifecycle of the single real-time connection. The machine takes events
//! as input and produces a new machine plus a list of actions to execute.
//!
//! The actual I/O (opening sockets, timers, publishing) is performed by
//! sync-client, not by this module. This enables instant unit testing without
//! network mocks.
//!
//! Every connection attempt is tagged with an *epoch*. Events produced by a
//! superseded attempt (or by a reconnect timer scheduled before a
//! `disconnect()`) carry an old epoch and are ignored.

use std::time::Duration;

/// WebSocket close code for a normal closure.
pub const NORMAL_CLOSE: u16 = 1000;

/// Reason published when the token source has nothing to offer.
pub const REASON_NO_TOKEN: &str = "no token";

/// Reason published when the reconnect budget is used up.
pub const REASON_RETRIES_EXHAUSTED: &str = "retries exhausted";

/// Observable connection state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    #[default]
    Disconnected,
    /// Token lookup or handshake in progress.
    Connecting,
    /// Handshake succeeded, frames are flowing.
    Connected,
    /// Last attempt or connection failed.
    Error {
        /// Human-readable reason.
        reason: String,
    },
}

impl ConnectionState {
    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if a connect attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Reason text when in the error state.
    pub fn error_reason(&self) -> Option<&str> {
        match self {
            Self::Error { reason } => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error { reason } => write!(f, "error: {}", reason),
        }
    }
}

/// Exponential reconnect schedule.
///
/// `delay(attempt) = min(base_delay * 2^attempt, max_delay)`, no jitter, so
/// the sequence is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Number of retries before giving up.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Default first delay (1.5 s).
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1500);
    /// Default delay cap (30 s).
    pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(30_000);
    /// Default retry ceiling.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Delay to wait before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // 2^attempt overflows u32 past 31; the cap has been reached long before.
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_delay: Self::DEFAULT_MAX_DELAY,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Events that can occur in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Caller asked to connect.
    ConnectRequested,
    /// Caller asked to disconnect.
    DisconnectRequested,
    /// Token source had no token for this attempt.
    TokenUnavailable {
        /// Attempt the event belongs to.
        epoch: u64,
    },
    /// Handshake completed.
    HandshakeSucceeded {
        /// Attempt the event belongs to.
        epoch: u64,
    },
    /// Handshake failed (network, timeout, server error).
    HandshakeFailed {
        /// Attempt the event belongs to.
        epoch: u64,
        /// Error message describing the failure.
        reason: String,
    },
    /// Server refused the token. Never retried.
    AuthRejected {
        /// Attempt the event belongs to.
        epoch: u64,
        /// Error message describing the rejection.
        reason: String,
    },
    /// Peer sent a close frame.
    PeerClosed {
        /// Attempt the event belongs to.
        epoch: u64,
        /// WebSocket close code.
        code: u16,
        /// Close reason text.
        reason: String,
    },
    /// Read, write or keep-alive failure on a live connection.
    TransportFailed {
        /// Attempt the event belongs to.
        epoch: u64,
        /// Error message describing the failure.
        reason: String,
    },
    /// A scheduled reconnect timer elapsed.
    ReconnectTimerFired {
        /// Epoch of the failure that scheduled the timer.
        epoch: u64,
    },
}

/// Actions to be executed by sync-client.
///
/// These are instructions, not side effects. sync-client interprets them in
/// order and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Tear down any previous connection, then obtain a token and open a new one.
    Open {
        /// Epoch to tag all events of this attempt with.
        epoch: u64,
    },
    /// Close the live connection, if any.
    Close,
    /// Start a cancellable reconnect timer.
    ScheduleReconnect {
        /// Epoch the timer must still match when it fires.
        epoch: u64,
        /// 1-based retry number.
        attempt: u32,
        /// Delay before firing.
        delay: Duration,
    },
    /// Cancel any pending reconnect timer.
    CancelReconnect,
    /// Publish the new state to observers.
    Publish(ConnectionState),
}

/// Connection state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempt: u32,
    should_reconnect: bool,
    epoch: u64,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    /// Create a new machine in the Disconnected state.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            attempt: 0,
            should_reconnect: false,
            epoch: 0,
            policy,
        }
    }

    /// Current observable state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Retries scheduled since the last successful handshake.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether failures will schedule a reconnect.
    pub fn should_reconnect(&self) -> bool {
        self.should_reconnect
    }

    /// Epoch of the current (or most recent) attempt.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The reconnect policy in use.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Process an event and return the new machine plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (sync-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(mut self, event: Event) -> (Self, Vec<Action>) {
        let actions = match event {
            Event::ConnectRequested => self.on_connect_requested(),
            Event::DisconnectRequested => self.on_disconnect_requested(),
            Event::ReconnectTimerFired { epoch } => self.on_timer(epoch),
            other => {
                if !self.is_current(&other) {
                    return (self, vec![]);
                }
                self.on_attempt_event(other)
            }
        };
        (self, actions)
    }

    fn on_connect_requested(&mut self) -> Vec<Action> {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return vec![];
        }
        self.should_reconnect = true;
        self.attempt = 0;
        self.begin_attempt(vec![Action::CancelReconnect])
    }

    fn on_disconnect_requested(&mut self) -> Vec<Action> {
        self.epoch += 1;
        self.should_reconnect = false;
        self.attempt = 0;
        self.state = ConnectionState::Disconnected;
        vec![
            Action::CancelReconnect,
            Action::Close,
            Action::Publish(ConnectionState::Disconnected),
        ]
    }

    fn on_timer(&mut self, epoch: u64) -> Vec<Action> {
        let waiting = matches!(self.state, ConnectionState::Error { .. });
        if !self.should_reconnect || epoch != self.epoch || !waiting {
            return vec![];
        }
        self.begin_attempt(vec![])
    }

    fn begin_attempt(&mut self, mut actions: Vec<Action>) -> Vec<Action> {
        self.epoch += 1;
        self.state = ConnectionState::Connecting;
        actions.push(Action::Open { epoch: self.epoch });
        actions.push(Action::Publish(ConnectionState::Connecting));
        actions
    }

    fn is_current(&self, event: &Event) -> bool {
        let epoch = match event {
            Event::TokenUnavailable { epoch }
            | Event::HandshakeSucceeded { epoch }
            | Event::HandshakeFailed { epoch, .. }
            | Event::AuthRejected { epoch, .. }
            | Event::PeerClosed { epoch, .. }
            | Event::TransportFailed { epoch, .. } => *epoch,
            _ => return false,
        };
        epoch == self.epoch
            && matches!(
                self.state,
                ConnectionState::Connecting | ConnectionState::Connected
            )
    }

    fn on_attempt_event(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::HandshakeSucceeded { .. } if self.state.is_connecting() => {
                self.attempt = 0;
                self.state = ConnectionState::Connected;
                vec![Action::Publish(ConnectionState::Connected)]
            }
            Event::TokenUnavailable { .. } => self.terminal(REASON_NO_TOKEN.to_string()),
            Event::AuthRejected { reason, .. } => self.terminal(reason),
            Event::PeerClosed { code, .. } if code == NORMAL_CLOSE => {
                self.should_reconnect = false;
                self.state = ConnectionState::Disconnected;
                vec![
                    Action::Close,
                    Action::Publish(ConnectionState::Disconnected),
                ]
            }
            Event::PeerClosed { code, reason, .. } => {
                self.fail(format!("connection closed abnormally ({}): {}", code, reason))
            }
            Event::HandshakeFailed { reason, .. } | Event::TransportFailed { reason, .. } => {
                self.fail(reason)
            }
            _ => vec![],
        }
    }

    /// Failure that disables reconnecting (auth problems).
    fn terminal(&mut self, reason: String) -> Vec<Action> {
        self.should_reconnect = false;
        let state = ConnectionState::Error { reason };
        self.state = state.clone();
        vec![Action::Close, Action::Publish(state)]
    }

    /// Retryable failure: schedule a reconnect or give up.
    fn fail(&mut self, reason: String) -> Vec<Action> {
        let state = ConnectionState::Error { reason };
        self.state = state.clone();
        let mut actions = vec![Action::Close, Action::Publish(state)];

        if !self.should_reconnect {
            return actions;
        }

        if self.attempt >= self.policy.max_attempts {
            self.should_reconnect = false;
            let exhausted = ConnectionState::Error {
                reason: REASON_RETRIES_EXHAUSTED.to_string(),
            };
            self.state = exhausted.clone();
            actions.push(Action::Publish(exhausted));
            return actions;
        }

        let delay = self.policy.delay_for(self.attempt);
        self.attempt += 1;
        actions.push(Action::ScheduleReconnect {
            epoch: self.epoch,
            attempt: self.attempt,
            delay,
        });
        actions
    }
}

impl Default for ConnectionMachine {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled_delay(actions: &[Action]) -> Option<Duration> {
        actions.iter().find_map(|a| match a {
            Action::ScheduleReconnect { delay, .. } => Some(*delay),
            _ => None,
        })
    }

    fn connecting() -> ConnectionMachine {
        let (machine, _) = ConnectionMachine::default().on_event(Event::ConnectRequested);
        machine
    }

    fn connected() -> ConnectionMachine {
        let machine = connecting();
        let epoch = machine.epoch();
        let (machine, _) = machine.on_event(Event::HandshakeSucceeded { epoch });
        machine
    }

    // ===========================================
    // Basic transitions
    // ===========================================

    #[test]
    fn starts_disconnected() {
        let machine = ConnectionMachine::default();
        assert_eq!(machine.state(), &ConnectionState::Disconnected);
        assert!(!machine.should_reconnect());
    }

    #[test]
    fn connect_request_transitions_to_connecting() {
        let (machine, actions) = ConnectionMachine::default().on_event(Event::ConnectRequested);

        assert!(machine.state().is_connecting());
        assert!(machine.should_reconnect());
        assert!(actions
            .iter()
            .any(|a| matches!(a, Action::Open { epoch } if *epoch == machine.epoch())));
        assert!(actions.contains(&Action::Publish(ConnectionState::Connecting)));
    }

    #[test]
    fn connect_is_idempotent_while_connecting_or_connected() {
        let (_, actions) = connecting().on_event(Event::ConnectRequested);
        assert!(actions.is_empty());

        let (_, actions) = connected().on_event(Event::ConnectRequested);
        assert!(actions.is_empty());
    }

    #[test]
    fn handshake_success_resets_attempts() {
        let machine = connecting();
        let epoch = machine.epoch();
        let (machine, _) = machine.on_event(Event::HandshakeFailed {
            epoch,
            reason: "refused".into(),
        });
        assert_eq!(machine.attempt(), 1);

        let epoch = machine.epoch();
        let (machine, _) = machine.on_event(Event::ReconnectTimerFired { epoch });
        let epoch = machine.epoch();
        let (machine, actions) = machine.on_event(Event::HandshakeSucceeded { epoch });

        assert!(machine.state().is_connected());
        assert_eq!(machine.attempt(), 0);
        assert_eq!(actions, vec![Action::Publish(ConnectionState::Connected)]);
    }

    #[test]
    fn missing_token_is_terminal_without_reconnect() {
        let machine = connecting();
        let epoch = machine.epoch();
        let (machine, actions) = machine.on_event(Event::TokenUnavailable { epoch });

        assert_eq!(machine.state().error_reason(), Some(REASON_NO_TOKEN));
        assert!(!machine.should_reconnect());
        assert_eq!(scheduled_delay(&actions), None);
    }

    #[test]
    fn auth_rejection_is_not_retried() {
        let machine = connecting();
        let epoch = machine.epoch();
        let (machine, actions) = machine.on_event(Event::AuthRejected {
            epoch,
            reason: "unauthorized: 401".into(),
        });

        assert_eq!(machine.state().error_reason(), Some("unauthorized: 401"));
        assert!(!machine.should_reconnect());
        assert_eq!(scheduled_delay(&actions), None);
    }

    // ===========================================
    // Backoff
    // ===========================================

    #[test]
    fn backoff_sequence_then_exhaustion() {
        let mut machine = connecting();
        let mut delays = Vec::new();

        for _ in 0..5 {
            let epoch = machine.epoch();
            let (next, actions) = machine.on_event(Event::HandshakeFailed {
                epoch,
                reason: "refused".into(),
            });
            delays.push(scheduled_delay(&actions).expect("reconnect scheduled"));

            let epoch = next.epoch();
            let (next, actions) = next.on_event(Event::ReconnectTimerFired { epoch });
            assert!(actions.iter().any(|a| matches!(a, Action::Open { .. })));
            machine = next;
        }

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1500),
                Duration::from_millis(3000),
                Duration::from_millis(6000),
                Duration::from_millis(12000),
                Duration::from_millis(24000),
            ]
        );

        // 6th failure: no timer, terminal error.
        let epoch = machine.epoch();
        let (machine, actions) = machine.on_event(Event::HandshakeFailed {
            epoch,
            reason: "refused".into(),
        });
        assert_eq!(scheduled_delay(&actions), None);
        assert!(!machine.should_reconnect());
        assert_eq!(
            machine.state().error_reason(),
            Some(REASON_RETRIES_EXHAUSTED)
        );
        assert_eq!(
            actions.last(),
            Some(&Action::Publish(ConnectionState::Error {
                reason: REASON_RETRIES_EXHAUSTED.into()
            }))
        );
    }

    #[test]
    fn backoff_is_capped() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(5), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(31), Duration::from_millis(30_000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(30_000));
    }

    #[test]
    fn connect_after_exhaustion_starts_fresh() {
        let policy = ReconnectPolicy {
            max_attempts: 0,
            ..ReconnectPolicy::default()
        };
        let (machine, _) = ConnectionMachine::new(policy).on_event(Event::ConnectRequested);
        let epoch = machine.epoch();
        let (machine, _) = machine.on_event(Event::HandshakeFailed {
            epoch,
            reason: "down".into(),
        });
        assert_eq!(
            machine.state().error_reason(),
            Some(REASON_RETRIES_EXHAUSTED)
        );

        let (machine, actions) = machine.on_event(Event::ConnectRequested);
        assert!(machine.state().is_connecting());
        assert!(machine.should_reconnect());
        assert!(actions.iter().any(|a| matches!(a, Action::Open { .. })));
    }

    // ===========================================
    // Disconnect and stale events
    // ===========================================

    #[test]
    fn disconnect_cancels_and_closes() {
        let (machine, actions) = connected().on_event(Event::DisconnectRequested);

        assert_eq!(machine.state(), &ConnectionState::Disconnected);
        assert!(!machine.should_reconnect());
        assert_eq!(
            actions,
            vec![
                Action::CancelReconnect,
                Action::Close,
                Action::Publish(ConnectionState::Disconnected),
            ]
        );
    }

    #[test]
    fn timer_scheduled_before_disconnect_is_ignored() {
        let machine = connecting();
        let epoch = machine.epoch();
        let (machine, actions) = machine.on_event(Event::HandshakeFailed {
            epoch,
            reason: "refused".into(),
        });
        let timer_epoch = actions
            .iter()
            .find_map(|a| match a {
                Action::ScheduleReconnect { epoch, .. } => Some(*epoch),
                _ => None,
            })
            .unwrap();

        let (machine, _) = machine.on_event(Event::DisconnectRequested);
        let (machine, actions) = machine.on_event(Event::ReconnectTimerFired { epoch: timer_epoch });

        assert!(actions.is_empty());
        assert_eq!(machine.state(), &ConnectionState::Disconnected);
    }

    #[test]
    fn stale_attempt_events_are_ignored() {
        let machine = connected();
        let old_epoch = machine.epoch();
        let (machine, _) = machine.on_event(Event::DisconnectRequested);
        let (machine, _) = machine.on_event(Event::ConnectRequested);

        let (machine, actions) = machine.on_event(Event::TransportFailed {
            epoch: old_epoch,
            reason: "late failure".into(),
        });
        assert!(actions.is_empty());
        assert!(machine.state().is_connecting());
    }

    #[test]
    fn normal_close_disconnects_without_reconnect() {
        let machine = connected();
        let epoch = machine.epoch();
        let (machine, actions) = machine.on_event(Event::PeerClosed {
            epoch,
            code: NORMAL_CLOSE,
            reason: "bye".into(),
        });

        assert_eq!(machine.state(), &ConnectionState::Disconnected);
        assert!(!machine.should_reconnect());
        assert_eq!(scheduled_delay(&actions), None);
    }

    #[test]
    fn abnormal_close_schedules_reconnect() {
        let machine = connected();
        let epoch = machine.epoch();
        let (machine, actions) = machine.on_event(Event::PeerClosed {
            epoch,
            code: 1001,
            reason: "going away".into(),
        });

        assert!(machine
            .state()
            .error_reason()
            .is_some_and(|r| r.contains("1001")));
        assert_eq!(scheduled_delay(&actions), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn transport_failure_while_connected_reconnects() {
        let machine = connected();
        let epoch = machine.epoch();
        let (machine, actions) = machine.on_event(Event::TransportFailed {
            epoch,
            reason: "keep-alive timeout".into(),
        });

        assert_eq!(machine.state().error_reason(), Some("keep-alive timeout"));
        assert!(actions.contains(&Action::Close));
        assert_eq!(scheduled_delay(&actions), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(
            ConnectionState::Error {
                reason: "no token".into()
            }
            .to_string(),
            "error: no token"
        );
    }
}
