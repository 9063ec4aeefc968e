//! Identity types for Tether Sync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for one file transfer inside a batch.
///
/// UUID v4 format (16 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(uuid::Uuid);

impl JobId {
    /// Create a new random JobId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create a JobId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        uuid::Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_is_uuid_v4() {
        let id = JobId::new();
        assert_eq!(id.as_uuid().get_version_num(), 4);
    }

    #[test]
    fn job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn job_id_from_invalid_length_fails() {
        assert!(JobId::from_bytes(&[0u8; 8]).is_none());
        assert!(JobId::from_bytes(&[0u8; 16]).is_some());
    }

    #[test]
    fn job_id_debug_is_short() {
        let id = JobId::new();
        let debug = format!("{:?}", id);
        assert_eq!(debug.len(), "JobId()".len() + 8);
    }
}
