//! Restricted-input mode contract.
//!
//! Lock mode (screen pinning, kiosk mode) is best effort. Both calls return a
//! two-outcome result; a denial only degrades the session.

use thiserror::Error;

/// The platform refused a lock-mode transition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lock mode denied: {reason}")]
pub struct LockModeDenied {
    /// Platform-provided reason.
    pub reason: String,
}

impl LockModeDenied {
    /// Create a denial.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Platform restricted-input mode.
pub trait LockMode: Send {
    /// Request the mode.
    fn enter(&mut self) -> Result<(), LockModeDenied>;

    /// Release the mode.
    fn exit(&mut self) -> Result<(), LockModeDenied>;
}
