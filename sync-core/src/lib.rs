//! # sync-core
//!
//! Pure logic for Tether Sync (no I/O, instant tests).
//!
//! This crate implements the connection state machine, the transfer batch
//! model and progress tracking without any network or disk I/O, enabling
//! fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (network, disk, timers) is performed by `sync-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod progress;
pub mod state;

pub use batch::{Batch, BatchReport, BatchResult, FileSource, JobStatus, TransferJob};
pub use progress::ProgressTracker;
pub use state::{
    Action, ConnectionMachine, ConnectionState, Event, ReconnectPolicy, NORMAL_CLOSE,
    REASON_NO_TOKEN, REASON_RETRIES_EXHAUSTED,
};
