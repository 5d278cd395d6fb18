//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.
//!
//! Checks on the simulated platform only apply once the observation is
//! settled: a completion report still in flight may legitimately leave a
//! surface on screen until the controller reconciles it.

use zenguard_core::Verdict;

use super::{Invariant, InvariantResult, SessionObservation};

/// No surface without a session.
///
/// The controller never wants a surface while idle, and once every
/// completion report is delivered the platform shows none either.
pub struct PresentationRequiresSession;

impl Invariant for PresentationRequiresSession {
    fn name(&self) -> &'static str {
        "presentation_requires_session"
    }

    fn check(&self, state: &SessionObservation) -> InvariantResult {
        if state.presentation_wanted && !state.active {
            return Err(self.violation("presentation wanted while idle".into()));
        }
        if state.is_settled() && !state.active && state.live_presentations > 0 {
            return Err(self.violation(format!(
                "{} presentation(s) on screen after the session ended",
                state.live_presentations
            )));
        }
        Ok(())
    }
}

/// A tick chain is armed exactly while a session is active.
pub struct TimerMatchesSession;

impl Invariant for TimerMatchesSession {
    fn name(&self) -> &'static str {
        "timer_matches_session"
    }

    fn check(&self, state: &SessionObservation) -> InvariantResult {
        if state.timer_armed != state.active {
            return Err(self.violation(format!(
                "timer armed = {}, session active = {}",
                state.timer_armed, state.active
            )));
        }
        if state.tick_source_running != state.active {
            return Err(self.violation(format!(
                "tick source running = {}, session active = {}",
                state.tick_source_running, state.active
            )));
        }
        Ok(())
    }
}

/// At most one surface on screen.
pub struct SinglePresentation;

impl Invariant for SinglePresentation {
    fn name(&self) -> &'static str {
        "single_presentation"
    }

    fn check(&self, state: &SessionObservation) -> InvariantResult {
        if state.live_presentations > 1 {
            return Err(self.violation(format!(
                "{} presentations on screen",
                state.live_presentations
            )));
        }
        Ok(())
    }
}

/// A blocked application stays covered.
///
/// While active, if the last verdict was Block and the surface has not
/// failed, the controller wants a surface.
pub struct BlockedAppCovered;

impl Invariant for BlockedAppCovered {
    fn name(&self) -> &'static str {
        "blocked_app_covered"
    }

    fn check(&self, state: &SessionObservation) -> InvariantResult {
        let blocked = state.active && state.last_verdict == Some(Verdict::Block);
        if blocked && !state.presentation_failed && !state.presentation_wanted {
            return Err(self.violation("blocked app in front without a presentation".into()));
        }
        Ok(())
    }
}

/// Lock mode never outlives the session.
pub struct LockModeReleasedWhenIdle;

impl Invariant for LockModeReleasedWhenIdle {
    fn name(&self) -> &'static str {
        "lock_mode_released_when_idle"
    }

    fn check(&self, state: &SessionObservation) -> InvariantResult {
        if state.is_settled() && !state.active && state.lock_mode_held {
            return Err(self.violation("lock mode held while idle".into()));
        }
        Ok(())
    }
}

/// Every started session ends exactly once.
pub struct SessionsEndOnce;

impl Invariant for SessionsEndOnce {
    fn name(&self) -> &'static str {
        "sessions_end_once"
    }

    fn check(&self, state: &SessionObservation) -> InvariantResult {
        let running = u64::from(state.active);
        if state.sessions_started != state.sessions_ended + running {
            return Err(self.violation(format!(
                "{} started, {} ended, active = {}",
                state.sessions_started, state.sessions_ended, state.active
            )));
        }
        Ok(())
    }
}

/// Published snapshot versions strictly increase.
pub struct SnapshotVersionsIncrease;

impl Invariant for SnapshotVersionsIncrease {
    fn name(&self) -> &'static str {
        "snapshot_versions_increase"
    }

    fn check(&self, state: &SessionObservation) -> InvariantResult {
        for window in state.snapshot_versions.windows(2) {
            if window[1] <= window[0] {
                return Err(self.violation(format!(
                    "snapshot version went {} → {}",
                    window[0], window[1]
                )));
            }
        }
        Ok(())
    }
}
