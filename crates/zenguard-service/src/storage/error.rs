//! Storage error types.

use thiserror::Error;

/// Errors from settings storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Underlying database or file failure.
    ///
    /// Usually transient. The engine treats a failed read at start as a
    /// rejected start, and a failed write as a warning.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Stored bytes could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Slot index past the last slot.
    #[error("slot {slot} out of range (max {max})")]
    SlotOutOfRange {
        /// Requested slot.
        slot: usize,
        /// Number of slots.
        max: usize,
    },

    /// Attempted to store an empty application id.
    #[error("empty application id for slot {slot}")]
    EmptyAppId {
        /// Requested slot.
        slot: usize,
    },
}

impl StorageError {
    /// Returns true if retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
