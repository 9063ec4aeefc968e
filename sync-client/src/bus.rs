//! In-process message bus.
//!
//! Two latest-value slots backed by `tokio::sync::watch`: the current
//! [`ConnectionState`] and the most recent [`InboundFrame`]. A subscriber sees
//! the current value immediately and then each change. Values are replaced,
//! never queued, so a slow subscriber only ever sees the newest one; the
//! frame sequence number lets it notice what it skipped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tether_sync_core::ConnectionState;
use tether_sync_types::Frame;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};

/// An inbound application frame with its per-bus sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// Strictly increasing, starting at 1.
    pub sequence: u64,
    /// Frame payload.
    pub frame: Frame,
}

/// Single-writer, multi-reader latest-value bus.
///
/// Cloning yields another handle to the same slots.
#[derive(Debug, Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

#[derive(Debug)]
struct BusInner {
    state: watch::Sender<ConnectionState>,
    frame: watch::Sender<Option<InboundFrame>>,
    sequence: AtomicU64,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    /// Create a bus holding `Disconnected` and no frame.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (frame, _) = watch::channel(None);
        Self {
            inner: Arc::new(BusInner {
                state,
                frame,
                sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the connection state. Unchanged values are not re-announced.
    pub fn publish_state(&self, state: ConnectionState) {
        self.inner.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    /// Replace the latest frame. Never blocks.
    pub fn publish_frame(&self, frame: Frame) -> u64 {
        let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner
            .frame
            .send_replace(Some(InboundFrame { sequence, frame }));
        sequence
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Most recent frame, if any arrived.
    pub fn latest_frame(&self) -> Option<InboundFrame> {
        self.inner.frame.borrow().clone()
    }

    /// Raw receiver for the state slot.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Raw receiver for the frame slot.
    pub fn frame_receiver(&self) -> watch::Receiver<Option<InboundFrame>> {
        self.inner.frame.subscribe()
    }

    /// Stream of states: the current one first, then every change.
    pub fn subscribe_state(&self) -> WatchStream<ConnectionState> {
        WatchStream::new(self.state_receiver())
    }

    /// Stream of frames: the latest one first (if any), then every new one.
    pub fn subscribe_frames(&self) -> impl Stream<Item = InboundFrame> + Send + Unpin + 'static {
        WatchStream::new(self.frame_receiver()).filter_map(|frame| frame)
    }

    /// Number of live state subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.receiver_count()
    }
}
