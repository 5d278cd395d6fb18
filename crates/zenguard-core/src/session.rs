//! Session controller state machine.
//!
//! Owns the session state, the countdown and the presentation slot. Uses the
//! action pattern: every input is a [`SessionEvent`], every output is a list
//! of [`SessionAction`]s for the driver to execute. The controller never
//! blocks and never performs I/O, so all of its transitions are evaluated on
//! whichever single control path the driver dedicates to it.
//!
//! # State Machine
//!
//! ```text
//! ┌──────┐  Start(d > 0)  ┌────────┐  Stop / EmergencyExit / expiry  ┌─────────────┐
//! │ Idle │───────────────>│ Active │────────────────────────────────>│ Terminating │
//! └──────┘                └────────┘                                 └─────────────┘
//!    ^                                                                      │
//!    └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `Terminating` only exists inside a single stop: it guarantees the teardown
//! sequence (cancel timer, release presentation, exit lock mode) runs once.
//!
//! # Presentation slot
//!
//! Showing the blocking surface is asynchronous: the controller emits
//! [`SessionAction::ShowPresentation`] and the driver later reports
//! [`SessionEvent::PresentationShown`]. While the request is in flight the
//! slot is `Requested`, which already counts as "a presentation exists" so no
//! second show is ever issued. If the surface stops being wanted before the
//! acknowledgement arrives (an allowed app came to the front, or the session
//! stopped), the acknowledged handle is hidden immediately.
//!
//! # Late reports
//!
//! A lock-mode denial carries the chain of the session that asked for lock
//! mode. A denial that arrives after that session ended is ignored, so it can
//! never stop a later session from releasing lock mode.

use crate::{
    AllowList, AppId, Decision, ForegroundChange, KeyEvent, KeyPhase, Notice,
    PresentationHandle, SessionAction, SessionError, SessionEvent, SessionSnapshot, StopReason,
    TickChain, TickOutcome, UnresolvedDisposition, Verdict,
    countdown::CountdownTimer,
    policy,
};

/// Identifier of the engine's own application.
pub const DEFAULT_SELF_ID: &str = "dev.zenguard";

/// Session controller configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The engine's own application id. Always allowed.
    pub self_id: AppId,
    /// Handling of foreground changes the host could not resolve.
    pub unresolved: UnresolvedDisposition,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { self_id: DEFAULT_SELF_ID.to_string(), unresolved: UnresolvedDisposition::default() }
    }
}

/// Session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session.
    Idle,
    /// Enforcement running.
    Active {
        /// Applications exempt from blocking for this session.
        allow_list: AllowList,
    },
    /// Teardown in progress.
    Terminating,
}

/// Presentation ownership as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationSlot {
    /// No surface and no request in flight.
    Absent,
    /// Show requested, acknowledgement pending.
    Requested {
        /// False if the surface must be hidden as soon as it is acknowledged.
        wanted: bool,
    },
    /// Surface on screen.
    Live(PresentationHandle),
}

impl PresentationSlot {
    /// True if the controller currently wants a surface on screen.
    pub fn is_wanted(self) -> bool {
        matches!(self, Self::Requested { wanted: true } | Self::Live(_))
    }

    /// Handle of the live surface. `None` if nothing is on screen yet.
    pub fn handle(self) -> Option<PresentationHandle> {
        match self {
            Self::Live(handle) => Some(handle),
            Self::Absent | Self::Requested { .. } => None,
        }
    }
}

/// Lock-mode request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockModeState {
    /// No lock-mode request outstanding.
    Released,
    /// Enter requested (and not reported as denied).
    Requested,
    /// Platform refused; session runs with soft enforcement.
    Denied,
}

/// Session controller.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies - fully testable in simulation.
#[derive(Debug, Clone)]
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    countdown: CountdownTimer,
    presentation: PresentationSlot,
    lock_mode: LockModeState,
    /// Most recent foreground change, recorded even while idle so a start can
    /// evaluate the current application without waiting for the next event.
    last_foreground: Option<ForegroundChange>,
    /// Last allow/block verdict of this session. `None` before the first one.
    last_verdict: Option<Verdict>,
    degraded: bool,
    notice_sent: bool,
    published: SessionSnapshot,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionController {
    /// Create an idle controller.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            countdown: CountdownTimer::new(),
            presentation: PresentationSlot::Absent,
            lock_mode: LockModeState::Released,
            last_foreground: None,
            last_verdict: None,
            degraded: false,
            notice_sent: false,
            published: SessionSnapshot::default(),
        }
    }

    /// Process an event and return actions.
    ///
    /// A [`SessionAction::PublishSnapshot`] is appended whenever the
    /// observable state changed.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidDuration` if a start carries an absent, zero,
    ///   negative or oversized duration. Nothing changes in that case.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        let mut actions = match event {
            SessionEvent::Start { duration_secs, allow_list } => {
                self.apply_start(duration_secs, allow_list)?
            },
            SessionEvent::Stop { reason } => self.apply_stop(reason, None),
            SessionEvent::ForegroundChanged(change) => self.apply_foreground(change),
            SessionEvent::Key(key) => self.apply_key(key),
            SessionEvent::TimerTick { chain } => self.apply_tick(chain),
            SessionEvent::EmergencyExit => self.apply_emergency_exit(),
            SessionEvent::PresentationShown { handle } => self.apply_presentation_shown(handle),
            SessionEvent::PresentationFailed { reason } => self.apply_presentation_failed(reason),
            SessionEvent::LockModeDenied { chain, reason } => {
                self.apply_lock_mode_denied(chain, reason)
            },
            SessionEvent::LaunchRequested { app_id } => self.apply_launch(app_id)?,
            SessionEvent::LaunchFailed { app_id, reason } => {
                self.apply_launch_failed(&app_id, &reason)
            },
        };

        self.publish_if_changed(&mut actions);
        Ok(actions)
    }

    /// Start a session of `duration_secs` seconds.
    ///
    /// No-op if a session is already active.
    pub fn start(
        &mut self,
        duration_secs: i64,
        allow_list: AllowList,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.handle(SessionEvent::Start { duration_secs: Some(duration_secs), allow_list })
    }

    /// Stop the session. No-op if idle.
    pub fn stop(&mut self, reason: StopReason) -> Vec<SessionAction> {
        self.handle(SessionEvent::Stop { reason }).unwrap_or_default()
    }

    /// Evaluate a foreground change.
    pub fn on_foreground_change(&mut self, change: ForegroundChange) -> Vec<SessionAction> {
        self.handle(SessionEvent::ForegroundChanged(change)).unwrap_or_default()
    }

    /// Evaluate a key event. The key is suppressed iff the result contains
    /// [`SessionAction::ConsumeKey`].
    pub fn on_key_event(&mut self, key: KeyEvent) -> Vec<SessionAction> {
        self.handle(SessionEvent::Key(key)).unwrap_or_default()
    }

    /// Deliver a tick from `chain`.
    pub fn on_timer_tick(&mut self, chain: TickChain) -> Vec<SessionAction> {
        self.handle(SessionEvent::TimerTick { chain }).unwrap_or_default()
    }

    /// Countdown expired outside the tick path. Same as
    /// `stop(StopReason::Expired)`.
    pub fn on_timer_expired(&mut self) -> Vec<SessionAction> {
        self.stop(StopReason::Expired)
    }

    /// User activated the emergency exit.
    pub fn on_emergency_exit(&mut self) -> Vec<SessionAction> {
        self.handle(SessionEvent::EmergencyExit).unwrap_or_default()
    }

    /// User picked `app_id` on the blocking surface.
    ///
    /// # Errors
    ///
    /// - `SessionError::LaunchNotAllowed` if the session does not allow the
    ///   application. Nothing changes in that case.
    pub fn on_launch_requested(
        &mut self,
        app_id: impl Into<AppId>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.handle(SessionEvent::LaunchRequested { app_id: app_id.into() })
    }

    fn apply_start(
        &mut self,
        duration_secs: Option<i64>,
        allow_list: AllowList,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != SessionState::Idle {
            tracing::debug!(?duration_secs, "start ignored: session already active");
            return Ok(Vec::new());
        }

        let secs = validate_duration(duration_secs)?;
        let chain = self.countdown.arm(secs);

        tracing::info!(
            duration_secs = secs,
            allowed = allow_list.len(),
            %chain,
            "focus session started"
        );

        self.state = SessionState::Active { allow_list };
        self.lock_mode = LockModeState::Requested;
        self.last_verdict = None;
        self.degraded = false;
        self.notice_sent = false;

        let mut actions = vec![
            SessionAction::ArmTimer { chain, duration_secs: secs },
            SessionAction::EnterLockMode { chain },
            SessionAction::SessionStarted { duration_secs: secs },
        ];

        // Never observed counts as unresolved
        let current = self.last_foreground.as_ref().and_then(|change| change.app_id.clone());
        self.evaluate(current.as_deref(), &mut actions);

        Ok(actions)
    }

    fn apply_stop(
        &mut self,
        reason: StopReason,
        expired_chain: Option<TickChain>,
    ) -> Vec<SessionAction> {
        if !self.is_active() {
            tracing::debug!(?reason, "stop ignored: no active session");
            return Vec::new();
        }

        self.state = SessionState::Terminating;
        let mut actions = Vec::new();

        if let Some(chain) = self.countdown.cancel().or(expired_chain) {
            actions.push(SessionAction::CancelTimer { chain });
        }

        self.release_presentation(&mut actions);

        if self.lock_mode == LockModeState::Requested {
            actions.push(SessionAction::ExitLockMode);
        }
        self.lock_mode = LockModeState::Released;

        self.last_verdict = None;
        self.state = SessionState::Idle;
        actions.push(SessionAction::SessionEnded { reason });

        tracing::info!(?reason, "focus session ended");
        actions
    }

    fn apply_foreground(&mut self, change: ForegroundChange) -> Vec<SessionAction> {
        let app_id = change.app_id.clone();
        self.last_foreground = Some(change);

        if !self.is_active() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.evaluate(app_id.as_deref(), &mut actions);
        actions
    }

    fn apply_key(&mut self, key: KeyEvent) -> Vec<SessionAction> {
        if !self.is_active() || key.phase != KeyPhase::Down || !key.code.is_navigation() {
            return Vec::new();
        }

        // The key may move the foreground before the monitor reports it
        let mut actions = Vec::new();
        self.acquire_presentation(&mut actions);
        actions.push(SessionAction::BringToFront);
        actions.push(SessionAction::ConsumeKey { code: key.code });

        tracing::debug!(code = ?key.code, "navigation key suppressed");
        actions
    }

    fn apply_tick(&mut self, chain: TickChain) -> Vec<SessionAction> {
        match self.countdown.tick(chain) {
            TickOutcome::Stale => {
                tracing::trace!(%chain, "stale tick ignored");
                Vec::new()
            },
            TickOutcome::Remaining(remaining_secs) => match self.presentation {
                PresentationSlot::Live(handle) => {
                    vec![SessionAction::UpdatePresentation { handle, remaining_secs }]
                },
                PresentationSlot::Absent | PresentationSlot::Requested { .. } => Vec::new(),
            },
            TickOutcome::Expired => self.apply_stop(StopReason::Expired, Some(chain)),
        }
    }

    fn apply_emergency_exit(&mut self) -> Vec<SessionAction> {
        if !self.is_active() {
            tracing::debug!("emergency exit ignored: no active session");
            return Vec::new();
        }
        self.apply_stop(StopReason::UserExit, None)
    }

    fn apply_presentation_shown(&mut self, handle: PresentationHandle) -> Vec<SessionAction> {
        match self.presentation {
            PresentationSlot::Requested { wanted: true } if self.is_active() => {
                self.presentation = PresentationSlot::Live(handle);
                tracing::debug!(handle = handle.id(), "presentation shown");
                Vec::new()
            },
            PresentationSlot::Live(current) if current == handle => Vec::new(),
            PresentationSlot::Requested { .. } => {
                self.presentation = PresentationSlot::Absent;
                tracing::debug!(handle = handle.id(), "presentation no longer wanted, hiding");
                vec![SessionAction::HidePresentation { handle }]
            },
            PresentationSlot::Live(_) | PresentationSlot::Absent => {
                tracing::warn!(handle = handle.id(), "unexpected presentation shown, hiding");
                vec![SessionAction::HidePresentation { handle }]
            },
        }
    }

    fn apply_presentation_failed(&mut self, reason: String) -> Vec<SessionAction> {
        let PresentationSlot::Requested { wanted } = self.presentation else {
            tracing::debug!(%reason, "presentation failure without pending request");
            return Vec::new();
        };
        self.presentation = PresentationSlot::Absent;

        if !wanted || !self.is_active() {
            return Vec::new();
        }

        tracing::warn!(%reason, "presentation unavailable, continuing with soft enforcement");
        self.degraded = true;
        self.notice(Notice::PresentationUnavailable { reason })
    }

    fn apply_lock_mode_denied(&mut self, chain: TickChain, reason: String) -> Vec<SessionAction> {
        if self.countdown.armed_chain() != Some(chain) {
            tracing::debug!(%chain, %reason, "lock mode denial for a finished session ignored");
            return Vec::new();
        }
        if !self.is_active() || self.lock_mode != LockModeState::Requested {
            tracing::debug!(%reason, "lock mode denial without pending request");
            return Vec::new();
        }

        tracing::warn!(%reason, "lock mode denied, continuing with soft enforcement");
        self.lock_mode = LockModeState::Denied;
        self.degraded = true;
        self.notice(Notice::LockModeUnavailable { reason })
    }

    fn apply_launch(&mut self, app_id: AppId) -> Result<Vec<SessionAction>, SessionError> {
        let SessionState::Active { allow_list } = &self.state else {
            tracing::debug!(%app_id, "launch ignored: no active session");
            return Ok(Vec::new());
        };

        let decision = policy::decide(Some(app_id.as_str()), allow_list, &self.config.self_id);
        if decision != Decision::Allow {
            tracing::warn!(%app_id, "launch rejected: not on the allow-list");
            return Err(SessionError::LaunchNotAllowed { app_id });
        }

        let mut actions = Vec::new();
        self.release_presentation(&mut actions);
        self.last_verdict = Some(Verdict::Allow);
        tracing::info!(%app_id, "launching allowed application");
        actions.push(SessionAction::LaunchApp { app_id });
        Ok(actions)
    }

    fn apply_launch_failed(&mut self, app_id: &str, reason: &str) -> Vec<SessionAction> {
        if !self.is_active() {
            return Vec::new();
        }

        // Whatever is in front is still there
        tracing::warn!(app_id, reason, "launch failed, re-evaluating foreground");
        let current = self.last_foreground.as_ref().and_then(|change| change.app_id.clone());
        let mut actions = Vec::new();
        self.evaluate(current.as_deref(), &mut actions);
        actions
    }

    /// Apply the allow-list policy to `app_id` and adjust the presentation.
    fn evaluate(&mut self, app_id: Option<&str>, actions: &mut Vec<SessionAction>) {
        let SessionState::Active { allow_list } = &self.state else {
            return;
        };

        let decision = policy::decide(app_id, allow_list, &self.config.self_id);
        let verdict = self.config.unresolved.resolve(decision);
        tracing::debug!(app_id, ?decision, ?verdict, "foreground evaluated");

        match verdict {
            Verdict::Allow => self.release_presentation(actions),
            Verdict::Block => {
                self.acquire_presentation(actions);
                // A single show can lose a race against a fast app switch
                actions.push(SessionAction::BringToFront);
            },
            Verdict::Keep => return,
        }
        self.last_verdict = Some(verdict);
    }

    fn acquire_presentation(&mut self, actions: &mut Vec<SessionAction>) {
        match self.presentation {
            PresentationSlot::Absent => {
                let SessionState::Active { allow_list } = &self.state else {
                    return;
                };
                actions.push(SessionAction::ShowPresentation {
                    remaining_secs: self.countdown.snapshot(),
                    allow_list: allow_list.clone(),
                });
                self.presentation = PresentationSlot::Requested { wanted: true };
            },
            PresentationSlot::Requested { wanted: false } => {
                self.presentation = PresentationSlot::Requested { wanted: true };
            },
            PresentationSlot::Requested { wanted: true } | PresentationSlot::Live(_) => {},
        }
    }

    fn release_presentation(&mut self, actions: &mut Vec<SessionAction>) {
        match self.presentation {
            PresentationSlot::Live(handle) => {
                self.presentation = PresentationSlot::Absent;
                actions.push(SessionAction::HidePresentation { handle });
            },
            PresentationSlot::Requested { .. } => {
                self.presentation = PresentationSlot::Requested { wanted: false };
            },
            PresentationSlot::Absent => {},
        }
    }

    fn notice(&mut self, notice: Notice) -> Vec<SessionAction> {
        if self.notice_sent {
            return Vec::new();
        }
        self.notice_sent = true;
        vec![SessionAction::Notice(notice)]
    }

    fn publish_if_changed(&mut self, actions: &mut Vec<SessionAction>) {
        let active = self.is_active();
        let current = SessionSnapshot {
            version: self.published.version,
            active,
            remaining_secs: if active { self.countdown.snapshot() } else { 0 },
            presentation_visible: matches!(self.presentation, PresentationSlot::Live(_)),
            degraded: active && self.degraded,
        };

        if !current.same_state(&self.published) {
            self.published = SessionSnapshot { version: self.published.version + 1, ..current };
            actions.push(SessionAction::PublishSnapshot(self.published));
        }
    }

    /// Controller configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// True while a session is active.
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Active { .. })
    }

    /// Seconds remaining in the session. Meaningless while idle.
    pub fn remaining_secs(&self) -> u32 {
        self.countdown.snapshot()
    }

    /// True while a tick chain is armed.
    pub fn timer_armed(&self) -> bool {
        self.countdown.is_armed()
    }

    /// Currently armed tick chain. `None` if disarmed.
    pub fn armed_chain(&self) -> Option<TickChain> {
        self.countdown.armed_chain()
    }

    /// Presentation slot.
    pub fn presentation(&self) -> PresentationSlot {
        self.presentation
    }

    /// Lock-mode request state.
    pub fn lock_mode(&self) -> LockModeState {
        self.lock_mode
    }

    /// True if a platform denial reduced enforcement for this session.
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    /// Most recent foreground change. `None` if none observed yet.
    pub fn last_foreground(&self) -> Option<&ForegroundChange> {
        self.last_foreground.as_ref()
    }

    /// Last allow/block verdict of the current session. `None` if no
    /// foreground change has been decided since start.
    pub fn last_verdict(&self) -> Option<Verdict> {
        self.last_verdict
    }

    /// Last published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.published
    }
}

fn validate_duration(duration_secs: Option<i64>) -> Result<u32, SessionError> {
    duration_secs
        .filter(|secs| *secs > 0)
        .and_then(|secs| u32::try_from(secs).ok())
        .ok_or(SessionError::InvalidDuration { duration_secs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KeyCode;

    fn notes_only() -> AllowList {
        AllowList::from_ids(["com.example.notes"])
    }

    fn shown(controller: &mut SessionController, id: u64) -> PresentationHandle {
        let handle = PresentationHandle::new(id);
        controller.handle(SessionEvent::PresentationShown { handle }).unwrap();
        handle
    }

    #[test]
    fn rejects_non_positive_durations() {
        let mut controller = SessionController::default();

        for duration_secs in [None, Some(0), Some(-30), Some(i64::from(u32::MAX) + 1)] {
            let result =
                controller.handle(SessionEvent::Start { duration_secs, allow_list: notes_only() });
            assert_eq!(result, Err(SessionError::InvalidDuration { duration_secs }));
            assert_eq!(controller.state(), &SessionState::Idle);
            assert!(!controller.timer_armed());
        }
    }

    #[test]
    fn start_arms_timer_then_lock_mode() {
        let mut controller = SessionController::default();
        let actions = controller.start(60, notes_only()).unwrap();

        assert!(matches!(actions.as_slice(), [
            SessionAction::ArmTimer { duration_secs: 60, .. },
            SessionAction::EnterLockMode { .. },
            SessionAction::SessionStarted { duration_secs: 60 },
            SessionAction::PublishSnapshot(_),
        ]));
        assert!(controller.is_active());
        assert!(controller.timer_armed());
    }

    #[test]
    fn start_evaluates_current_foreground() {
        let mut controller = SessionController::default();
        controller.on_foreground_change(ForegroundChange::resolved("com.example.game", 1));

        let actions = controller.start(60, notes_only()).unwrap();

        assert!(actions.iter().any(|a| matches!(a, SessionAction::ShowPresentation { .. })));
        assert!(actions.contains(&SessionAction::BringToFront));
    }

    #[test]
    fn repeated_start_is_a_no_op() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        let chain = controller.armed_chain();

        let actions = controller.start(600, AllowList::new()).unwrap();

        assert!(actions.is_empty());
        assert_eq!(controller.armed_chain(), chain);
        assert_eq!(controller.remaining_secs(), 60);
    }

    #[test]
    fn blocked_app_is_covered_once() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();

        let first = controller.on_foreground_change(ForegroundChange::resolved("com.game", 2));
        let second = controller.on_foreground_change(ForegroundChange::resolved("com.game", 3));

        let shows = |actions: &[SessionAction]| {
            actions.iter().filter(|a| matches!(a, SessionAction::ShowPresentation { .. })).count()
        };
        assert_eq!(shows(&first), 1);
        assert_eq!(shows(&second), 0);
        assert!(second.contains(&SessionAction::BringToFront));
    }

    #[test]
    fn allowed_app_releases_live_presentation() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        controller.on_foreground_change(ForegroundChange::resolved("com.game", 2));
        let handle = shown(&mut controller, 7);

        let actions =
            controller.on_foreground_change(ForegroundChange::resolved("com.example.notes", 3));

        assert!(actions.contains(&SessionAction::HidePresentation { handle }));
        assert_eq!(controller.presentation(), PresentationSlot::Absent);
    }

    #[test]
    fn acknowledgement_after_release_hides_surface() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        controller.on_foreground_change(ForegroundChange::resolved("com.game", 2));
        controller.on_foreground_change(ForegroundChange::resolved("com.example.notes", 3));

        let handle = PresentationHandle::new(9);
        let actions = controller.handle(SessionEvent::PresentationShown { handle }).unwrap();

        assert_eq!(actions, vec![SessionAction::HidePresentation { handle }]);
        assert_eq!(controller.presentation(), PresentationSlot::Absent);
    }

    #[test]
    fn unresolved_foreground_keeps_state_by_default() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        controller.on_foreground_change(ForegroundChange::resolved("com.game", 2));
        shown(&mut controller, 1);

        let actions = controller.on_foreground_change(ForegroundChange::unresolved(3));

        assert!(actions.is_empty());
        assert!(controller.presentation().is_wanted());
    }

    #[test]
    fn unresolved_foreground_blocks_when_configured() {
        let config =
            SessionConfig { unresolved: UnresolvedDisposition::Block, ..SessionConfig::default() };
        let mut controller = SessionController::new(config);
        controller.start(60, notes_only()).unwrap();

        let actions = controller.on_foreground_change(ForegroundChange::unresolved(3));

        assert!(actions.iter().any(|a| matches!(a, SessionAction::ShowPresentation { .. })));
    }

    #[test]
    fn navigation_key_is_consumed_only_while_active() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();

        let actions = controller.on_key_event(KeyEvent::down(KeyCode::Home));
        assert!(actions.contains(&SessionAction::ConsumeKey { code: KeyCode::Home }));

        let actions = controller.on_key_event(KeyEvent::up(KeyCode::Home));
        assert!(actions.is_empty());

        let actions = controller.on_key_event(KeyEvent::down(KeyCode::Other(29)));
        assert!(actions.is_empty());

        controller.stop(StopReason::HostStop);
        let actions = controller.on_key_event(KeyEvent::down(KeyCode::Home));
        assert!(actions.is_empty());
    }

    #[test]
    fn stop_tears_down_in_order() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        controller.on_foreground_change(ForegroundChange::resolved("com.game", 2));
        let handle = shown(&mut controller, 3);
        let Some(chain) = controller.armed_chain() else {
            panic!("timer should be armed");
        };

        let actions = controller.stop(StopReason::HostStop);

        assert!(matches!(actions.as_slice(), [
            SessionAction::CancelTimer { chain: c },
            SessionAction::HidePresentation { handle: h },
            SessionAction::ExitLockMode,
            SessionAction::SessionEnded { reason: StopReason::HostStop },
            SessionAction::PublishSnapshot(_),
        ] if *c == chain && *h == handle));
        assert!(controller.stop(StopReason::HostStop).is_empty());
    }

    #[test]
    fn expiry_cancels_the_expired_chain() {
        let mut controller = SessionController::default();
        controller.start(1, notes_only()).unwrap();
        let Some(chain) = controller.armed_chain() else {
            panic!("timer should be armed");
        };

        let actions = controller.on_timer_tick(chain);

        assert!(actions.contains(&SessionAction::CancelTimer { chain }));
        assert!(actions.contains(&SessionAction::SessionEnded { reason: StopReason::Expired }));
        assert!(!controller.is_active());
    }

    #[test]
    fn lock_mode_denial_degrades_with_single_notice() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        let Some(chain) = controller.armed_chain() else {
            panic!("timer should be armed");
        };

        let actions = controller
            .handle(SessionEvent::LockModeDenied { chain, reason: "not pinned".into() })
            .unwrap();
        assert!(actions.iter().any(|a| matches!(a, SessionAction::Notice(_))));
        assert!(controller.is_active());
        assert!(controller.snapshot().degraded);

        controller.on_foreground_change(ForegroundChange::resolved("com.game", 2));
        let actions = controller
            .handle(SessionEvent::PresentationFailed { reason: "no overlay permission".into() })
            .unwrap();
        assert!(!actions.iter().any(|a| matches!(a, SessionAction::Notice(_))));

        // Denied lock mode is not exited
        let actions = controller.stop(StopReason::HostStop);
        assert!(!actions.contains(&SessionAction::ExitLockMode));
    }

    #[test]
    fn denial_from_a_finished_session_is_ignored() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        let Some(first) = controller.armed_chain() else {
            panic!("timer should be armed");
        };
        controller.stop(StopReason::HostStop);
        controller.start(60, notes_only()).unwrap();

        let actions = controller
            .handle(SessionEvent::LockModeDenied { chain: first, reason: "not pinned".into() })
            .unwrap();

        assert!(actions.is_empty());
        assert_eq!(controller.lock_mode(), LockModeState::Requested);
        assert!(!controller.degraded());

        let actions = controller.stop(StopReason::HostStop);
        assert!(actions.contains(&SessionAction::ExitLockMode));
    }

    #[test]
    fn launch_of_allowed_app_releases_presentation() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        controller.on_foreground_change(ForegroundChange::resolved("com.game", 2));
        let handle = shown(&mut controller, 4);

        let actions = controller.on_launch_requested("com.example.notes").unwrap();

        assert!(matches!(actions.as_slice(), [
            SessionAction::HidePresentation { handle: h },
            SessionAction::LaunchApp { app_id },
            SessionAction::PublishSnapshot(_),
        ] if *h == handle && app_id == "com.example.notes"));
        assert_eq!(controller.presentation(), PresentationSlot::Absent);
        assert_eq!(controller.last_verdict(), Some(Verdict::Allow));
        assert!(controller.is_active());
    }

    #[test]
    fn launch_of_own_app_is_allowed() {
        let mut controller = SessionController::default();
        controller.start(60, AllowList::new()).unwrap();

        let actions = controller.on_launch_requested(DEFAULT_SELF_ID).unwrap();
        assert!(actions.contains(&SessionAction::LaunchApp { app_id: DEFAULT_SELF_ID.into() }));
    }

    #[test]
    fn launch_of_unlisted_app_is_rejected() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        controller.on_foreground_change(ForegroundChange::resolved("com.game", 2));
        shown(&mut controller, 4);
        let before = controller.snapshot();

        for app_id in ["com.game", ""] {
            assert_eq!(
                controller.on_launch_requested(app_id),
                Err(SessionError::LaunchNotAllowed { app_id: app_id.into() })
            );
        }
        assert!(controller.presentation().handle().is_some());
        assert_eq!(controller.snapshot(), before);
    }

    #[test]
    fn launch_while_idle_does_nothing() {
        let mut controller = SessionController::default();
        assert_eq!(controller.on_launch_requested("com.game"), Ok(Vec::new()));
    }

    #[test]
    fn failed_launch_covers_blocked_foreground_again() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        controller.on_foreground_change(ForegroundChange::resolved("com.game", 2));
        shown(&mut controller, 4);
        controller.on_launch_requested("com.example.notes").unwrap();

        let actions = controller
            .handle(SessionEvent::LaunchFailed {
                app_id: "com.example.notes".into(),
                reason: "no launcher activity".into(),
            })
            .unwrap();

        assert!(actions.iter().any(|a| matches!(a, SessionAction::ShowPresentation { .. })));
        assert_eq!(controller.last_verdict(), Some(Verdict::Block));
    }

    #[test]
    fn snapshot_version_increases_on_change_only() {
        let mut controller = SessionController::default();
        controller.start(60, notes_only()).unwrap();
        let started = controller.snapshot();
        assert!(started.active);
        assert_eq!(started.remaining_secs, 60);

        // Allowed app while nothing is shown changes nothing observable
        controller.on_foreground_change(ForegroundChange::resolved("com.example.notes", 2));
        assert_eq!(controller.snapshot(), started);

        controller.stop(StopReason::UserExit);
        let stopped = controller.snapshot();
        assert!(!stopped.active);
        assert_eq!(stopped.version, started.version + 1);
    }
}
