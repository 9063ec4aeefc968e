//! Mock transport for testing.
//!
//! Scripts handshake outcomes, pushes inbound frames into the live
//! connection, and counts opens and closes for verification.

use super::{Connection, Inbound, Transport, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tether_sync_types::Frame;
use tokio::sync::mpsc;

/// Mock transport for testing.
///
/// Clones share state, so a test keeps one clone and hands the other to the
/// connection manager.
#[derive(Debug, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    open_attempts: usize,
    opened: usize,
    closed: usize,
    live: usize,
    last_token: Option<String>,
    fail_next_open: VecDeque<TransportError>,
    fail_all_opens: Option<TransportError>,
    open_delay: Option<Duration>,
    no_pong: bool,
    stall_close: bool,
    current: Option<mpsc::UnboundedSender<MockEvent>>,
}

#[derive(Debug)]
enum MockEvent {
    Item(Inbound),
    Reset,
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cause the next open() to fail with the given error.
    pub fn fail_next_open(&self, error: &str) {
        self.lock()
            .fail_next_open
            .push_back(TransportError::ConnectionFailed(error.to_string()));
    }

    /// Cause the next open() to be rejected as unauthorized.
    pub fn reject_next_open(&self, status: &str) {
        self.lock()
            .fail_next_open
            .push_back(TransportError::Unauthorized(status.to_string()));
    }

    /// Cause every open() to fail until [`clear_failures`](Self::clear_failures).
    pub fn fail_all_opens(&self, error: &str) {
        self.lock().fail_all_opens = Some(TransportError::ConnectionFailed(error.to_string()));
    }

    /// Remove scripted failures.
    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.fail_next_open.clear();
        inner.fail_all_opens = None;
    }

    /// Delay every handshake by `delay`.
    pub fn set_open_delay(&self, delay: Duration) {
        self.lock().open_delay = Some(delay);
    }

    /// Stop answering pings.
    pub fn disable_pong(&self) {
        self.lock().no_pong = true;
    }

    /// Make close() on every new connection hang forever.
    pub fn stall_close(&self) {
        self.lock().stall_close = true;
    }

    /// Number of open() calls, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.lock().open_attempts
    }

    /// Number of successful handshakes.
    pub fn open_count(&self) -> usize {
        self.lock().opened
    }

    /// Number of connections closed by the client.
    pub fn close_count(&self) -> usize {
        self.lock().closed
    }

    /// Connections opened and not yet closed or dropped.
    pub fn live_connections(&self) -> usize {
        self.lock().live
    }

    /// Token presented at the last open().
    pub fn last_token(&self) -> Option<String> {
        self.lock().last_token.clone()
    }

    fn deliver(&self, item: Inbound) -> bool {
        self.lock()
            .current
            .as_ref()
            .is_some_and(|tx| tx.send(MockEvent::Item(item)).is_ok())
    }

    /// Deliver a text frame on the newest connection.
    pub fn push_text(&self, text: &str) -> bool {
        self.deliver(Inbound::Frame(Frame::Text(text.to_string())))
    }

    /// Deliver a binary frame on the newest connection.
    pub fn push_binary(&self, data: &[u8]) -> bool {
        self.deliver(Inbound::Frame(Frame::Binary(data.to_vec())))
    }

    /// Close the newest connection from the server side.
    pub fn close_from_peer(&self, code: u16, reason: &str) -> bool {
        self.deliver(Inbound::Closed {
            code,
            reason: reason.to_string(),
        })
    }

    /// Break the newest connection with a read error.
    pub fn fail_connection(&self) -> bool {
        self.lock()
            .current
            .take()
            .is_some_and(|tx| tx.send(MockEvent::Reset).is_ok())
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Connection = MockConnection;

    async fn open(&self, token: &str) -> Result<MockConnection, TransportError> {
        let delay = {
            let mut inner = self.lock();
            inner.open_attempts += 1;
            inner.last_token = Some(token.to_string());
            inner.open_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();

        // Check for forced failure
        if let Some(error) = inner.fail_next_open.pop_front() {
            return Err(error);
        }
        if let Some(error) = inner.fail_all_opens.clone() {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(previous) = inner.current.replace(tx.clone()) {
            let _ = previous.send(MockEvent::Reset);
        }
        inner.opened += 1;
        inner.live += 1;

        Ok(MockConnection {
            rx,
            tx,
            no_pong: inner.no_pong,
            stall_close: inner.stall_close,
            closed: false,
            shared: Arc::clone(&self.inner),
        })
    }
}

/// Connection handed out by [`MockTransport`].
#[derive(Debug)]
pub struct MockConnection {
    rx: mpsc::UnboundedReceiver<MockEvent>,
    tx: mpsc::UnboundedSender<MockEvent>,
    no_pong: bool,
    stall_close: bool,
    closed: bool,
    shared: Arc<Mutex<MockTransportInner>>,
}

impl MockConnection {
    fn release(&mut self, closed_by_client: bool) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut inner = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        inner.live = inner.live.saturating_sub(1);
        if closed_by_client {
            inner.closed += 1;
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn recv(&mut self) -> Result<Inbound, TransportError> {
        if self.closed {
            return Err(TransportError::NotConnected);
        }
        match self.rx.recv().await {
            Some(MockEvent::Item(item)) => Ok(item),
            Some(MockEvent::Reset) => {
                Err(TransportError::ReceiveFailed("connection reset".into()))
            }
            None => Err(TransportError::ConnectionClosed),
        }
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::NotConnected);
        }
        if !self.no_pong {
            let _ = self.tx.send(MockEvent::Item(Inbound::Pong));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.stall_close {
            std::future::pending::<()>().await;
        }
        self.release(true);
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.release(false);
    }
}
