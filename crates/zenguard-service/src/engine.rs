//! Async session engine.
//!
//! The engine is the single serialization point of the system: it owns the
//! [`SessionController`] and consumes one bounded queue of
//! [`EngineMessage`]s. Host commands, foreground changes, key events, ticks
//! and completion reports from the presentation and lock mode all enter
//! through that queue and are handled strictly in arrival order, one at a
//! time. Nothing else touches session state.
//!
//! # Completion reports
//!
//! Presentation and lock-mode calls return immediately. Their outcome
//! (`PresentationShown`, `PresentationFailed`, `LockModeDenied`,
//! `LaunchFailed`) is posted to the back of the queue, behind anything the
//! host already sent. A stop queued before a show completes therefore wins:
//! the controller hides the late surface as soon as its acknowledgement
//! comes through.
//!
//! When the queue is full, reports wait in an overflow list that is only
//! drained once the queue is empty, so they still never overtake host
//! messages, and they keep their order among themselves.
//!
//! # Shutdown
//!
//! When every [`EngineHandle`] is dropped or [`EngineHandle::shutdown`] is
//! called, the engine stops the session with `StopReason::Interrupted`,
//! reconciles completion reports still in the queue, and returns.

use std::{collections::VecDeque, time::Duration};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use zenguard_core::{
    AppId, ForegroundChange, HostCommand, KeyEvent, PresentationHandle, SessionAction,
    SessionConfig, SessionController, SessionError, SessionEvent, SessionSnapshot, StopReason,
    TickChain, env::Environment,
};

use crate::{
    lock_mode::LockMode,
    presentation::{Presentation, ShowRequest},
    storage::{SessionRecord, SettingsStore, StorageError},
    ticker::{self, TickerHandle},
};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the engine queue. Senders wait when it is full.
    pub queue_capacity: usize,
    /// Tick period of the countdown.
    pub tick_interval: Duration,
    /// Session controller configuration.
    pub session: SessionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 64,
            tick_interval: Duration::from_secs(1),
            session: SessionConfig::default(),
        }
    }
}

/// Errors reported to engine callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine has shut down. Keys should propagate and the host should
    /// treat enforcement as off.
    #[error("engine is not running")]
    Closed,

    /// The session controller rejected the request.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Settings storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What the host should do with a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// Swallow the key.
    Consumed,
    /// Let the host handle the key normally.
    Propagate,
}

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

/// Messages processed by the engine, in arrival order.
#[derive(Debug)]
pub enum EngineMessage {
    /// Start or stop command from the host.
    Command {
        /// The command.
        command: HostCommand,
        /// Outcome of the command.
        reply: Reply<()>,
    },
    /// Foreground application changed.
    Foreground(ForegroundChange),
    /// Key notification awaiting a disposition.
    Key {
        /// The key event.
        event: KeyEvent,
        /// Consumed or propagated.
        reply: oneshot::Sender<KeyDisposition>,
    },
    /// One tick from a tick source.
    Tick(TickChain),
    /// User activated the emergency exit.
    EmergencyExit,
    /// A requested presentation is on screen.
    PresentationShown(PresentationHandle),
    /// A requested presentation could not be shown.
    PresentationFailed(String),
    /// Lock mode was refused.
    LockModeDenied {
        /// Chain of the session that requested lock mode.
        chain: TickChain,
        /// Platform-provided reason.
        reason: String,
    },
    /// User picked an application on the blocking surface.
    Launch {
        /// Application to launch.
        app_id: AppId,
        /// Rejected if the session does not allow the application.
        reply: Reply<()>,
    },
    /// A launch could not be carried out.
    LaunchFailed {
        /// Application that was not launched.
        app_id: AppId,
        /// Platform-provided reason.
        reason: String,
    },
    /// Store an allow-list slot.
    SetSlot {
        /// Slot index.
        slot: usize,
        /// Application id.
        app_id: AppId,
        /// Outcome of the write.
        reply: Reply<()>,
    },
    /// Clear an allow-list slot.
    ClearSlot {
        /// Slot index.
        slot: usize,
        /// Outcome of the write.
        reply: Reply<()>,
    },
    /// Stop the session and exit the run loop.
    Shutdown,
}

/// Cloneable handle for feeding the engine and observing it.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    queue: mpsc::Sender<EngineMessage>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl EngineHandle {
    /// Send a host command and wait for its outcome.
    ///
    /// # Errors
    ///
    /// - `EngineError::Session` if a start carries an invalid duration
    /// - `EngineError::Storage` if the allow-list could not be read at start
    /// - `EngineError::Closed` if the engine has shut down
    pub async fn command(&self, command: HostCommand) -> Result<(), EngineError> {
        let (reply, outcome) = oneshot::channel();
        self.send(EngineMessage::Command { command, reply }).await?;
        outcome.await.map_err(|_| EngineError::Closed)?
    }

    /// Start a session of `duration_secs` seconds.
    ///
    /// # Errors
    ///
    /// See [`EngineHandle::command`].
    pub async fn start_focus(&self, duration_secs: i64) -> Result<(), EngineError> {
        self.command(HostCommand::StartFocus { duration_secs: Some(duration_secs) }).await
    }

    /// Stop the current session.
    ///
    /// # Errors
    ///
    /// - `EngineError::Closed` if the engine has shut down
    pub async fn stop_focus(&self) -> Result<(), EngineError> {
        self.command(HostCommand::StopFocus).await
    }

    /// Report a foreground change.
    ///
    /// # Errors
    ///
    /// - `EngineError::Closed` if the engine has shut down
    pub async fn foreground_changed(&self, change: ForegroundChange) -> Result<(), EngineError> {
        self.send(EngineMessage::Foreground(change)).await
    }

    /// Report a key event and wait for its disposition.
    ///
    /// # Errors
    ///
    /// - `EngineError::Closed` if the engine has shut down; the key must
    ///   then propagate
    pub async fn key_event(&self, event: KeyEvent) -> Result<KeyDisposition, EngineError> {
        let (reply, disposition) = oneshot::channel();
        self.send(EngineMessage::Key { event, reply }).await?;
        disposition.await.map_err(|_| EngineError::Closed)
    }

    /// Report the user's emergency exit.
    ///
    /// # Errors
    ///
    /// - `EngineError::Closed` if the engine has shut down
    pub async fn emergency_exit(&self) -> Result<(), EngineError> {
        self.send(EngineMessage::EmergencyExit).await
    }

    /// Launch `app_id`, picked by the user on the blocking surface.
    ///
    /// # Errors
    ///
    /// - `EngineError::Session` with `SessionError::LaunchNotAllowed` if the
    ///   running session does not allow the application
    /// - `EngineError::Closed` if the engine has shut down
    pub async fn launch_allowed(&self, app_id: impl Into<AppId>) -> Result<(), EngineError> {
        let (reply, outcome) = oneshot::channel();
        self.send(EngineMessage::Launch { app_id: app_id.into(), reply }).await?;
        outcome.await.map_err(|_| EngineError::Closed)?
    }

    /// Store `app_id` in allow-list slot `slot`.
    ///
    /// Takes effect at the next start; a running session keeps its list.
    ///
    /// # Errors
    ///
    /// - `EngineError::Storage` if the slot is invalid or the write failed
    /// - `EngineError::Closed` if the engine has shut down
    pub async fn set_slot(&self, slot: usize, app_id: impl Into<AppId>) -> Result<(), EngineError> {
        let (reply, outcome) = oneshot::channel();
        self.send(EngineMessage::SetSlot { slot, app_id: app_id.into(), reply }).await?;
        outcome.await.map_err(|_| EngineError::Closed)?
    }

    /// Clear allow-list slot `slot`.
    ///
    /// # Errors
    ///
    /// See [`EngineHandle::set_slot`].
    pub async fn clear_slot(&self, slot: usize) -> Result<(), EngineError> {
        let (reply, outcome) = oneshot::channel();
        self.send(EngineMessage::ClearSlot { slot, reply }).await?;
        outcome.await.map_err(|_| EngineError::Closed)?
    }

    /// Ask the engine to stop the session and exit.
    ///
    /// Returns without waiting; await the run future to observe completion.
    pub async fn shutdown(&self) {
        let _ = self.queue.send(EngineMessage::Shutdown).await;
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        *self.snapshots.borrow()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    async fn send(&self, message: EngineMessage) -> Result<(), EngineError> {
        self.queue.send(message).await.map_err(|_| EngineError::Closed)
    }
}

/// Session engine.
///
/// Owns the controller and the collaborators; see the module docs for the
/// processing model.
pub struct Engine<E, P, L, S>
where
    E: Environment,
    P: Presentation + 'static,
    L: LockMode + 'static,
    S: SettingsStore,
{
    env: E,
    config: EngineConfig,
    controller: SessionController,
    presentation: P,
    lock_mode: L,
    store: S,
    queue: mpsc::Receiver<EngineMessage>,
    /// Weak so the engine's own reports never keep the queue open.
    feedback: mpsc::WeakSender<EngineMessage>,
    /// Reports that did not fit into the queue.
    overflow: VecDeque<EngineMessage>,
    snapshots: watch::Sender<SessionSnapshot>,
    ticker: Option<TickerHandle>,
}

impl<E, P, L, S> Engine<E, P, L, S>
where
    E: Environment,
    P: Presentation + 'static,
    L: LockMode + 'static,
    S: SettingsStore,
{
    /// Create an engine and the handle that feeds it.
    pub fn new(
        env: E,
        presentation: P,
        lock_mode: L,
        store: S,
        config: EngineConfig,
    ) -> (Self, EngineHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let engine = Self {
            env,
            controller: SessionController::new(config.session.clone()),
            config,
            presentation,
            lock_mode,
            store,
            queue: rx,
            feedback: tx.downgrade(),
            overflow: VecDeque::new(),
            snapshots: snapshot_tx,
            ticker: None,
        };

        (engine, EngineHandle { queue: tx, snapshots: snapshot_rx })
    }

    /// Run until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        self.recover_stale_session();
        tracing::info!(capacity = self.config.queue_capacity, "session engine running");

        while let Some(message) = self.next_message().await {
            if matches!(message, EngineMessage::Shutdown) {
                break;
            }
            self.process(message);
        }

        self.shut_down();
    }

    /// Next message in arrival order. Overflowed reports come after
    /// everything already in the queue. `None` once every handle is gone.
    async fn next_message(&mut self) -> Option<EngineMessage> {
        if let Ok(message) = self.queue.try_recv() {
            return Some(message);
        }
        if let Some(message) = self.overflow.pop_front() {
            return Some(message);
        }
        self.queue.recv().await
    }

    /// Clear a session record left behind by an engine that died mid-session.
    fn recover_stale_session(&mut self) {
        match self.store.load_session() {
            Ok(Some(record)) => {
                tracing::warn!(
                    started_at_secs = record.started_at_secs,
                    duration_secs = record.duration_secs,
                    "clearing session record from an unfinished session"
                );
                if let Err(e) = self.store.clear_session() {
                    tracing::warn!(error = %e, "failed to clear stale session record");
                }
            },
            Ok(None) => {},
            Err(e) => tracing::warn!(error = %e, "failed to read session record"),
        }
    }

    fn process(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Command { command, reply } => {
                let outcome = self.handle_command(command);
                if let Err(e) = &outcome {
                    tracing::warn!(error = %e, "host command rejected");
                }
                let _ = reply.send(outcome);
            },
            EngineMessage::Foreground(change) => {
                let actions = self.controller.on_foreground_change(change);
                self.execute(actions);
            },
            EngineMessage::Key { event, reply } => {
                let actions = self.controller.on_key_event(event);
                let consumed =
                    actions.iter().any(|action| matches!(action, SessionAction::ConsumeKey { .. }));
                self.execute(actions);

                let disposition =
                    if consumed { KeyDisposition::Consumed } else { KeyDisposition::Propagate };
                let _ = reply.send(disposition);
            },
            EngineMessage::Tick(chain) => {
                let actions = self.controller.on_timer_tick(chain);
                self.execute(actions);
            },
            EngineMessage::EmergencyExit => {
                let actions = self.controller.on_emergency_exit();
                self.execute(actions);
            },
            EngineMessage::PresentationShown(handle) => {
                self.dispatch(SessionEvent::PresentationShown { handle });
            },
            EngineMessage::PresentationFailed(reason) => {
                self.dispatch(SessionEvent::PresentationFailed { reason });
            },
            EngineMessage::LockModeDenied { chain, reason } => {
                self.dispatch(SessionEvent::LockModeDenied { chain, reason });
            },
            EngineMessage::Launch { app_id, reply } => {
                let outcome = self
                    .controller
                    .handle(SessionEvent::LaunchRequested { app_id })
                    .map(|actions| self.execute(actions))
                    .map_err(EngineError::from);
                if let Err(e) = &outcome {
                    tracing::warn!(error = %e, "launch rejected");
                }
                let _ = reply.send(outcome);
            },
            EngineMessage::LaunchFailed { app_id, reason } => {
                self.dispatch(SessionEvent::LaunchFailed { app_id, reason });
            },
            EngineMessage::SetSlot { slot, app_id, reply } => {
                let outcome = self.store.set_slot(slot, &app_id).map_err(EngineError::from);
                tracing::debug!(slot, %app_id, ok = outcome.is_ok(), "allow-list slot set");
                let _ = reply.send(outcome);
            },
            EngineMessage::ClearSlot { slot, reply } => {
                let outcome = self.store.clear_slot(slot).map_err(EngineError::from);
                tracing::debug!(slot, ok = outcome.is_ok(), "allow-list slot cleared");
                let _ = reply.send(outcome);
            },
            EngineMessage::Shutdown => {},
        }
    }

    fn handle_command(&mut self, command: HostCommand) -> Result<(), EngineError> {
        match command {
            HostCommand::StartFocus { duration_secs } => {
                if self.controller.is_active() {
                    tracing::debug!(?duration_secs, "start ignored: session already active");
                    return Ok(());
                }

                // Without a readable list every app would be blocked
                let allow_list = self.store.allow_list()?;
                let actions =
                    self.controller.handle(SessionEvent::Start { duration_secs, allow_list })?;
                self.execute(actions);
            },
            HostCommand::StopFocus => {
                let actions = self.controller.stop(StopReason::HostStop);
                self.execute(actions);
            },
        }
        Ok(())
    }

    /// Feed an infallible event to the controller and execute the result.
    fn dispatch(&mut self, event: SessionEvent) {
        match self.controller.handle(event) {
            Ok(actions) => self.execute(actions),
            Err(e) => tracing::warn!(error = %e, "session event rejected"),
        }
    }

    fn execute(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            self.execute_action(action);
        }
    }

    fn execute_action(&mut self, action: SessionAction) {
        match action {
            SessionAction::ArmTimer { chain, duration_secs } => {
                tracing::debug!(%chain, duration_secs, "arming tick source");
                self.ticker = Some(ticker::spawn_tick_chain(
                    self.env.clone(),
                    chain,
                    self.config.tick_interval,
                    self.feedback.clone(),
                ));
            },
            SessionAction::CancelTimer { chain } => {
                if self.ticker.as_ref().is_some_and(|ticker| ticker.chain() == chain) {
                    if let Some(ticker) = self.ticker.take() {
                        ticker.cancel();
                    }
                    tracing::debug!(%chain, "tick source cancelled");
                }
            },
            SessionAction::EnterLockMode { chain } => {
                if let Err(denied) = self.lock_mode.enter() {
                    self.post(EngineMessage::LockModeDenied { chain, reason: denied.reason });
                }
            },
            SessionAction::ExitLockMode => {
                if let Err(denied) = self.lock_mode.exit() {
                    tracing::warn!(reason = %denied.reason, "lock mode exit refused");
                }
            },
            SessionAction::ShowPresentation { remaining_secs, allow_list } => {
                let request = ShowRequest { remaining_secs, allow_list: &allow_list };
                match self.presentation.show(request) {
                    Ok(handle) => self.post(EngineMessage::PresentationShown(handle)),
                    Err(e) => self.post(EngineMessage::PresentationFailed(e.to_string())),
                }
            },
            SessionAction::UpdatePresentation { handle, remaining_secs } => {
                self.presentation.update(handle, remaining_secs);
            },
            SessionAction::HidePresentation { handle } => self.presentation.hide(handle),
            SessionAction::BringToFront => self.presentation.bring_to_front(),
            SessionAction::LaunchApp { app_id } => {
                if let Err(e) = self.presentation.launch(&app_id) {
                    self.post(EngineMessage::LaunchFailed { app_id, reason: e.to_string() });
                }
            },
            SessionAction::ConsumeKey { .. } => {},
            SessionAction::SessionStarted { duration_secs } => {
                let record =
                    SessionRecord { started_at_secs: self.env.wall_clock_secs(), duration_secs };
                if let Err(e) = self.store.store_session(&record) {
                    tracing::warn!(error = %e, "failed to persist session record");
                }
            },
            SessionAction::SessionEnded { reason } => {
                if let Err(e) = self.store.clear_session() {
                    tracing::warn!(error = %e, ?reason, "failed to clear session record");
                }
            },
            SessionAction::Notice(notice) => self.presentation.notify(&notice),
            SessionAction::PublishSnapshot(snapshot) => {
                self.snapshots.send_replace(snapshot);
            },
        }
    }

    /// Queue a completion report behind everything already received.
    fn post(&mut self, message: EngineMessage) {
        if !self.overflow.is_empty() {
            self.overflow.push_back(message);
            return;
        }
        let Some(queue) = self.feedback.upgrade() else {
            self.overflow.push_back(message);
            return;
        };
        if let Err(e) = queue.try_send(message) {
            self.overflow.push_back(e.into_inner());
        }
    }

    fn shut_down(&mut self) {
        let actions = self.controller.stop(StopReason::Interrupted);
        self.execute(actions);

        // Reconcile reports still in flight; everything else is dropped
        self.queue.close();
        while let Some(message) = self.queue.try_recv().ok().or_else(|| self.overflow.pop_front()) {
            match message {
                EngineMessage::PresentationShown(_)
                | EngineMessage::PresentationFailed(_)
                | EngineMessage::LockModeDenied { .. }
                | EngineMessage::LaunchFailed { .. } => self.process(message),
                EngineMessage::Command { reply, .. }
                | EngineMessage::Launch { reply, .. }
                | EngineMessage::SetSlot { reply, .. }
                | EngineMessage::ClearSlot { reply, .. } => {
                    let _ = reply.send(Err(EngineError::Closed));
                },
                EngineMessage::Key { reply, .. } => {
                    let _ = reply.send(KeyDisposition::Propagate);
                },
                EngineMessage::Foreground(_)
                | EngineMessage::Tick(_)
                | EngineMessage::EmergencyExit
                | EngineMessage::Shutdown => {},
            }
        }

        self.ticker = None;
        tracing::info!("session engine stopped");
    }

    /// The controller, for inspection in tests.
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }
}
