//! Observable state for invariant checking.
//!
//! An observation captures the controller's view and the simulated platform's
//! view at one point in time. Invariants operate on observations rather than
//! live state so every check sees a consistent picture.

use zenguard_core::Verdict;

/// Combined controller and platform state.
#[derive(Debug, Clone, Default)]
pub struct SessionObservation {
    /// Controller reports an active session.
    pub active: bool,
    /// Controller has a tick chain armed.
    pub timer_armed: bool,
    /// Simulated tick source is running.
    pub tick_source_running: bool,
    /// Controller wants a surface on screen (requested or live).
    pub presentation_wanted: bool,
    /// Surfaces the simulated platform currently shows.
    pub live_presentations: usize,
    /// Completion reports not yet delivered to the controller.
    pub pending_feedback: usize,
    /// Last allow/block verdict of the session.
    pub last_verdict: Option<Verdict>,
    /// A show failure was delivered during the current session.
    pub presentation_failed: bool,
    /// Simulated platform holds lock mode.
    pub lock_mode_held: bool,
    /// Versions of every published snapshot, in publication order.
    pub snapshot_versions: Vec<u64>,
    /// `SessionStarted` actions observed.
    pub sessions_started: u64,
    /// `SessionEnded` actions observed.
    pub sessions_ended: u64,
}

impl SessionObservation {
    /// Observation of a controller that never started.
    pub fn idle() -> Self {
        Self::default()
    }

    /// True if every completion report has been delivered.
    pub fn is_settled(&self) -> bool {
        self.pending_feedback == 0
    }
}
