//! Simulation driver for the session controller.
//!
//! `SimDriver` executes [`SessionAction`]s the way the async engine does, but
//! against in-memory stand-ins. Completion reports (`PresentationShown`,
//! `PresentationFailed`, `LockModeDenied`, `LaunchFailed`) are queued rather
//! than delivered, so tests decide exactly which events overtake them.

use std::collections::{BTreeSet, VecDeque};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use zenguard_core::{
    AllowList, AppId, ForegroundChange, KeyCode, KeyEvent, Notice, PresentationHandle,
    SessionAction, SessionConfig, SessionController, SessionError, SessionEvent, SessionSnapshot,
    StopReason, TickChain,
};

use crate::{
    invariants::{InvariantRegistry, SessionObservation},
    operation::{ModelApp, Operation},
};

/// Platform misbehavior injected by the simulation.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultPlan {
    /// Probability in `[0, 1]` that a lock-mode request is refused.
    pub lock_mode_denial_rate: f64,
    /// Probability in `[0, 1]` that a show request fails.
    pub presentation_failure_rate: f64,
    /// Probability in `[0, 1]` that launching an allowed app fails.
    pub launch_failure_rate: f64,
}

impl FaultPlan {
    /// Platform that grants everything.
    pub fn none() -> Self {
        Self::default()
    }
}

/// Simulation driver for deterministic session testing.
pub struct SimDriver {
    controller: SessionController,
    feedback: VecDeque<SessionEvent>,
    faults: FaultPlan,
    rng: ChaCha8Rng,
    invariants: Option<InvariantRegistry>,

    live: BTreeSet<PresentationHandle>,
    next_handle: u64,
    tick_source: Option<TickChain>,
    retired_chains: Vec<TickChain>,
    lock_mode_held: bool,
    presentation_failed: bool,
    clock_secs: u64,

    shows: u64,
    updates: Vec<(PresentationHandle, u32)>,
    raises: u64,
    consumed: Vec<KeyCode>,
    launches: Vec<AppId>,
    notices: Vec<Notice>,
    snapshots: Vec<SessionSnapshot>,
    sessions_started: u64,
    ended: Vec<StopReason>,
}

impl Default for SimDriver {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SimDriver {
    /// Create a driver around a fresh controller.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            controller: SessionController::new(config),
            feedback: VecDeque::new(),
            faults: FaultPlan::none(),
            rng: ChaCha8Rng::seed_from_u64(0),
            invariants: None,
            live: BTreeSet::new(),
            next_handle: 1,
            tick_source: None,
            retired_chains: Vec::new(),
            lock_mode_held: false,
            presentation_failed: false,
            clock_secs: 0,
            shows: 0,
            updates: Vec::new(),
            raises: 0,
            consumed: Vec::new(),
            launches: Vec::new(),
            notices: Vec::new(),
            snapshots: Vec::new(),
            sessions_started: 0,
            ended: Vec::new(),
        }
    }

    /// Inject platform faults, sampled from a seeded RNG.
    #[must_use]
    pub fn with_faults(mut self, faults: FaultPlan, seed: u64) -> Self {
        self.faults = faults;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    /// Change the injected faults from now on. Reports already queued keep
    /// their outcome.
    pub fn set_faults(&mut self, faults: FaultPlan) {
        self.faults = faults;
    }

    /// Enable invariant checking after every dispatched event.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Feed one event to the controller and execute the resulting actions.
    ///
    /// Completion reports produced by the actions are queued, not delivered.
    pub fn dispatch(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        let context = format!("after {event:?}");
        let actions = self.controller.handle(event)?;
        for action in &actions {
            self.execute(action);
        }
        self.check_invariants(&context);
        Ok(actions)
    }

    /// Deliver the oldest queued completion report.
    ///
    /// Returns `None` if nothing was queued.
    pub fn deliver_one(&mut self) -> Option<Vec<SessionAction>> {
        let event = self.feedback.pop_front()?;
        if matches!(event, SessionEvent::PresentationFailed { .. }) {
            self.presentation_failed = true;
        }
        Some(self.dispatch(event).unwrap_or_default())
    }

    /// Deliver completion reports until the queue is empty.
    pub fn settle(&mut self) {
        while self.deliver_one().is_some() {}
    }

    /// Start a session with the model allow-list and settle.
    pub fn start(&mut self, duration_secs: i64) -> Result<Vec<SessionAction>, SessionError> {
        self.start_with(duration_secs, ModelApp::allow_list())
    }

    /// Start a session with `allow_list` and settle.
    pub fn start_with(
        &mut self,
        duration_secs: i64,
        allow_list: AllowList,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let actions =
            self.dispatch(SessionEvent::Start { duration_secs: Some(duration_secs), allow_list })?;
        self.settle();
        Ok(actions)
    }

    /// Bring `app_id` (or an unresolved app) to the front.
    pub fn foreground(&mut self, app_id: Option<&str>) -> Vec<SessionAction> {
        self.clock_secs += 1;
        let change = match app_id {
            Some(id) => ForegroundChange::resolved(id, self.clock_secs),
            None => ForegroundChange::unresolved(self.clock_secs),
        };
        self.dispatch(SessionEvent::ForegroundChanged(change)).unwrap_or_default()
    }

    /// Deliver a key event. Returns true if the key was consumed.
    pub fn key(&mut self, key: KeyEvent) -> bool {
        self.dispatch(SessionEvent::Key(key))
            .unwrap_or_default()
            .iter()
            .any(|action| matches!(action, SessionAction::ConsumeKey { .. }))
    }

    /// One second passes on the running tick source.
    pub fn tick(&mut self) -> Vec<SessionAction> {
        let Some(chain) = self.tick_source else {
            return Vec::new();
        };
        self.clock_secs += 1;
        self.dispatch(SessionEvent::TimerTick { chain }).unwrap_or_default()
    }

    /// Advance `secs` seconds, settling after each tick.
    pub fn advance(&mut self, secs: u32) {
        for _ in 0..secs {
            self.tick();
            self.settle();
        }
    }

    /// Apply a model operation.
    pub fn apply(&mut self, operation: &Operation) {
        match operation {
            Operation::Start { duration_secs } => {
                let _ = self.dispatch(SessionEvent::Start {
                    duration_secs: Some(*duration_secs),
                    allow_list: ModelApp::allow_list(),
                });
            },
            Operation::Stop { reason } => {
                let _ = self.dispatch(SessionEvent::Stop { reason: *reason });
            },
            Operation::Foreground { app } => {
                self.foreground(app.app_id());
            },
            Operation::Key { code, phase } => {
                self.key(KeyEvent { code: *code, phase: *phase });
            },
            Operation::Tick => {
                self.tick();
            },
            Operation::StaleTick => {
                if let Some(&chain) = self.retired_chains.last() {
                    let _ = self.dispatch(SessionEvent::TimerTick { chain });
                }
            },
            Operation::EmergencyExit => {
                let _ = self.dispatch(SessionEvent::EmergencyExit);
            },
            Operation::Launch { app } => {
                let app_id = app.app_id().unwrap_or_default().to_string();
                let _ = self.dispatch(SessionEvent::LaunchRequested { app_id });
            },
            Operation::DeliverFeedback => {
                self.deliver_one();
            },
            Operation::Settle => self.settle(),
        }
    }

    fn execute(&mut self, action: &SessionAction) {
        match action {
            SessionAction::ArmTimer { chain, .. } => {
                if let Some(previous) = self.tick_source.replace(*chain) {
                    self.retired_chains.push(previous);
                }
            },
            SessionAction::CancelTimer { chain } => {
                if self.tick_source == Some(*chain) {
                    self.tick_source = None;
                }
                self.retired_chains.push(*chain);
            },
            SessionAction::EnterLockMode { chain } => {
                let rate = self.faults.lock_mode_denial_rate.clamp(0.0, 1.0);
                if self.rng.gen_bool(rate) {
                    self.feedback.push_back(SessionEvent::LockModeDenied {
                        chain: *chain,
                        reason: "device owner required".into(),
                    });
                } else {
                    self.lock_mode_held = true;
                }
            },
            SessionAction::ExitLockMode => self.lock_mode_held = false,
            SessionAction::ShowPresentation { .. } => {
                self.shows += 1;
                let rate = self.faults.presentation_failure_rate.clamp(0.0, 1.0);
                if self.rng.gen_bool(rate) {
                    self.feedback.push_back(SessionEvent::PresentationFailed {
                        reason: "overlay permission revoked".into(),
                    });
                } else {
                    let handle = PresentationHandle::new(self.next_handle);
                    self.next_handle += 1;
                    self.live.insert(handle);
                    self.feedback.push_back(SessionEvent::PresentationShown { handle });
                }
            },
            SessionAction::UpdatePresentation { handle, remaining_secs } => {
                self.updates.push((*handle, *remaining_secs));
            },
            SessionAction::HidePresentation { handle } => {
                if !self.live.remove(handle) {
                    tracing::warn!(handle = handle.id(), "hide for unknown presentation");
                }
            },
            SessionAction::BringToFront => self.raises += 1,
            SessionAction::LaunchApp { app_id } => {
                self.launches.push(app_id.clone());
                let rate = self.faults.launch_failure_rate.clamp(0.0, 1.0);
                if self.rng.gen_bool(rate) {
                    self.feedback.push_back(SessionEvent::LaunchFailed {
                        app_id: app_id.clone(),
                        reason: "no launcher activity".into(),
                    });
                }
            },
            SessionAction::ConsumeKey { code } => self.consumed.push(*code),
            SessionAction::SessionStarted { .. } => {
                self.sessions_started += 1;
                self.presentation_failed = false;
            },
            SessionAction::SessionEnded { reason } => self.ended.push(*reason),
            SessionAction::Notice(notice) => self.notices.push(notice.clone()),
            SessionAction::PublishSnapshot(snapshot) => self.snapshots.push(*snapshot),
        }
    }

    /// Observable state for invariant checking.
    pub fn observe(&self) -> SessionObservation {
        SessionObservation {
            active: self.controller.is_active(),
            timer_armed: self.controller.timer_armed(),
            tick_source_running: self.tick_source.is_some(),
            presentation_wanted: self.controller.presentation().is_wanted(),
            live_presentations: self.live.len(),
            pending_feedback: self.feedback.len(),
            last_verdict: self.controller.last_verdict(),
            presentation_failed: self.presentation_failed,
            lock_mode_held: self.lock_mode_held,
            snapshot_versions: self.snapshots.iter().map(|s| s.version).collect(),
            sessions_started: self.sessions_started,
            sessions_ended: self.ended.len() as u64,
        }
    }

    /// Check invariants against the current state.
    pub fn check_invariants(&self, context: &str) {
        if let Some(ref registry) = self.invariants {
            registry.assert_all(&self.observe(), context);
        }
    }

    /// The driven controller.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Surfaces currently on screen.
    pub fn live_presentations(&self) -> Vec<PresentationHandle> {
        self.live.iter().copied().collect()
    }

    /// Show requests executed so far.
    pub fn shows(&self) -> u64 {
        self.shows
    }

    /// Countdown updates sent to surfaces, in order.
    pub fn updates(&self) -> &[(PresentationHandle, u32)] {
        &self.updates
    }

    /// Times the surface was raised to the front.
    pub fn raises(&self) -> u64 {
        self.raises
    }

    /// Keys suppressed so far.
    pub fn consumed_keys(&self) -> &[KeyCode] {
        &self.consumed
    }

    /// Applications launched from the blocking surface, in order.
    pub fn launches(&self) -> &[AppId] {
        &self.launches
    }

    /// Notices surfaced so far.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Snapshots published so far.
    pub fn snapshots(&self) -> &[SessionSnapshot] {
        &self.snapshots
    }

    /// End reasons, one per finished session.
    pub fn ended(&self) -> &[StopReason] {
        &self.ended
    }

    /// True while the simulated platform holds lock mode.
    pub fn lock_mode_held(&self) -> bool {
        self.lock_mode_held
    }

    /// Completion reports not yet delivered.
    pub fn pending_feedback(&self) -> usize {
        self.feedback.len()
    }
}
