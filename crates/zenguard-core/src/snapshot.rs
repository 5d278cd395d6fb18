//! Observable session state.
//!
//! External observers (host UI, diagnostics, the persisted active flag) read a
//! [`SessionSnapshot`] instead of the controller itself. Snapshots carry a
//! version that increases with every published change, so an observer can
//! tell a stale snapshot from a fresh one.

use serde::{Deserialize, Serialize};

/// Versioned snapshot of externally visible session state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Increases by one with every published change.
    pub version: u64,
    /// True while a session is active.
    pub active: bool,
    /// Seconds remaining. Zero when idle.
    pub remaining_secs: u32,
    /// True while the blocking surface is on screen.
    pub presentation_visible: bool,
    /// True if a platform denial reduced enforcement for this session.
    pub degraded: bool,
}

impl SessionSnapshot {
    /// True if both snapshots describe the same state, ignoring version.
    pub fn same_state(&self, other: &Self) -> bool {
        self.active == other.active
            && self.remaining_secs == other.remaining_secs
            && self.presentation_visible == other.presentation_visible
            && self.degraded == other.degraded
    }
}
