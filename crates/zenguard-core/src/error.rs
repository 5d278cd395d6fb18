//! Error types for session handling.
//!
//! Only mistakes in the request surface as errors. Platform denials, lookup
//! failures and repeated start/stop requests are absorbed by the controller
//! and never reach the caller as an `Err`.

use thiserror::Error;

/// Errors returned by [`crate::SessionController::handle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Start requested without a usable duration.
    ///
    /// The duration was absent, zero, negative, or too large to count down.
    /// The session state is unchanged.
    #[error("invalid session duration: {duration_secs:?}")]
    InvalidDuration {
        /// Duration as received from the host.
        duration_secs: Option<i64>,
    },

    /// Launch requested for an application the session does not allow.
    ///
    /// Nothing is launched and the blocking surface stays.
    #[error("launch not allowed during focus: {app_id:?}")]
    LaunchNotAllowed {
        /// Requested application.
        app_id: String,
    },
}

impl SessionError {
    /// Returns true if the error was caused by the request rather than the
    /// platform. Such requests must not be retried unchanged.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidDuration { .. } | Self::LaunchNotAllowed { .. })
    }
}
