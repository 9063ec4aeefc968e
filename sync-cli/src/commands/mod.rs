//! CLI command implementations.

pub mod listen;
pub mod login;
pub mod logout;
pub mod status;
pub mod upload;
