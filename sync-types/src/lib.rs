//! # sync-types
//!
//! Wire format types for the Tether Sync channel.
//!
//! This crate provides the foundational types used across all Tether crates:
//! - [`JobId`] - Identity of a single file transfer
//! - [`ApiResponse`] and the check/upload/login payloads - JSON wire format
//! - [`Frame`] - Inbound real-time application data
//! - [`SyncError`] - Error taxonomy shared by the client and the authority

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod messages;

pub use error::{AuthError, FileError, SyncError};
pub use ids::JobId;
pub use messages::{
    ApiResponse, CheckRequest, CheckResult, FileAction, Frame, LoginIdentifier, LoginRequest,
    LoginResponse, UploadResult, UserProfile, CODE_DISK_FULL, CODE_EXISTS, CODE_FORBIDDEN,
    CODE_LOCKED, CODE_NOT_FOUND, CODE_OK, CODE_UNAUTHORIZED,
};
