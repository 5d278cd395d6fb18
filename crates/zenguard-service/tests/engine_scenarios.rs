//! End-to-end engine scenarios on tokio's paused clock.
//!
//! The engine runs as a real task with recording collaborators; time only
//! moves when every task is idle, so tick delivery is deterministic.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::task::JoinHandle;
use zenguard_core::{
    ForegroundChange, HostCommand, KeyCode, KeyEvent, Notice, PresentationHandle, SessionError,
};
use zenguard_harness::SimEnv;
use zenguard_service::{
    ChaoticSettingsStore, Engine, EngineConfig, EngineError, EngineHandle, KeyDisposition,
    LockMode, LockModeDenied, MemorySettingsStore, Presentation, PresentationError, SessionRecord,
    SettingsStore, ShowRequest, StorageError,
};

const NOTES: &str = "com.example.notes";
const GAME: &str = "com.example.game";

#[derive(Debug, Default)]
struct PresentationLog {
    next_id: u64,
    live: Option<PresentationHandle>,
    shows: usize,
    hides: Vec<PresentationHandle>,
    updates: Vec<u32>,
    raises: usize,
    notices: Vec<Notice>,
    launches: Vec<String>,
    fail_with: Option<String>,
    fail_launches: bool,
}

#[derive(Debug, Clone, Default)]
struct RecordingPresentation(Arc<Mutex<PresentationLog>>);

impl RecordingPresentation {
    fn failing(reason: &str) -> Self {
        let presentation = Self::default();
        presentation.log().fail_with = Some(reason.to_string());
        presentation
    }

    fn failing_launches() -> Self {
        let presentation = Self::default();
        presentation.log().fail_launches = true;
        presentation
    }

    fn log(&self) -> std::sync::MutexGuard<'_, PresentationLog> {
        self.0.lock().unwrap()
    }
}

impl Presentation for RecordingPresentation {
    fn show(&mut self, _request: ShowRequest<'_>) -> Result<PresentationHandle, PresentationError> {
        let mut log = self.log();
        if let Some(reason) = log.fail_with.clone() {
            return Err(PresentationError::PermissionDenied(reason));
        }
        if let Some(handle) = log.live {
            return Ok(handle);
        }
        log.next_id += 1;
        log.shows += 1;
        let handle = PresentationHandle::new(log.next_id);
        log.live = Some(handle);
        Ok(handle)
    }

    fn update(&mut self, handle: PresentationHandle, remaining_secs: u32) {
        let mut log = self.log();
        if log.live == Some(handle) {
            log.updates.push(remaining_secs);
        }
    }

    fn hide(&mut self, handle: PresentationHandle) {
        let mut log = self.log();
        log.hides.push(handle);
        if log.live == Some(handle) {
            log.live = None;
        }
    }

    fn bring_to_front(&mut self) {
        self.log().raises += 1;
    }

    fn launch(&mut self, app_id: &str) -> Result<(), PresentationError> {
        let mut log = self.log();
        if log.fail_launches {
            return Err(PresentationError::Unavailable(format!("{app_id} is not installed")));
        }
        log.launches.push(app_id.to_string());
        Ok(())
    }

    fn notify(&mut self, notice: &Notice) {
        self.log().notices.push(notice.clone());
    }
}

#[derive(Debug, Default)]
struct LockLog {
    denials_left: usize,
    held: bool,
    enters: usize,
    exits: usize,
}

#[derive(Debug, Clone, Default)]
struct RecordingLockMode(Arc<Mutex<LockLog>>);

impl RecordingLockMode {
    fn denying() -> Self {
        Self::denying_times(usize::MAX)
    }

    fn denying_times(denials: usize) -> Self {
        let lock_mode = Self::default();
        lock_mode.log().denials_left = denials;
        lock_mode
    }

    fn log(&self) -> std::sync::MutexGuard<'_, LockLog> {
        self.0.lock().unwrap()
    }
}

impl LockMode for RecordingLockMode {
    fn enter(&mut self) -> Result<(), LockModeDenied> {
        let mut log = self.log();
        log.enters += 1;
        if log.denials_left > 0 {
            log.denials_left -= 1;
            return Err(LockModeDenied::new("screen pinning disabled"));
        }
        log.held = true;
        Ok(())
    }

    fn exit(&mut self) -> Result<(), LockModeDenied> {
        let mut log = self.log();
        log.exits += 1;
        log.held = false;
        Ok(())
    }
}

struct Fixture<S: SettingsStore> {
    handle: EngineHandle,
    presentation: RecordingPresentation,
    lock_mode: RecordingLockMode,
    store: S,
    engine: JoinHandle<()>,
}

fn spawn_with<S: SettingsStore>(
    store: S,
    presentation: RecordingPresentation,
    lock_mode: RecordingLockMode,
) -> Fixture<S> {
    let (engine, handle) = Engine::new(
        SimEnv::new(),
        presentation.clone(),
        lock_mode.clone(),
        store.clone(),
        EngineConfig::default(),
    );
    let engine = tokio::spawn(engine.run());
    Fixture { handle, presentation, lock_mode, store, engine }
}

fn spawn_default() -> Fixture<MemorySettingsStore> {
    spawn_with(
        MemorySettingsStore::with_slots([NOTES]),
        RecordingPresentation::default(),
        RecordingLockMode::default(),
    )
}

/// Wait until the engine has processed everything sent so far, including the
/// completion reports those messages produced.
async fn settle(handle: &EngineHandle) {
    for _ in 0..2 {
        let disposition = handle.key_event(KeyEvent::up(KeyCode::Other(0))).await.unwrap();
        assert_eq!(disposition, KeyDisposition::Propagate);
    }
}

async fn bring_to_front(handle: &EngineHandle, app_id: &str) {
    handle.foreground_changed(ForegroundChange::resolved(app_id, 0)).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn session_counts_down_and_expires() {
    let fx = spawn_default();
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(3).await.unwrap();
    settle(&fx.handle).await;

    let snapshot = fx.handle.snapshot();
    assert!(snapshot.active);
    assert!(snapshot.presentation_visible);
    assert_eq!(snapshot.remaining_secs, 3);
    assert!(fx.lock_mode.log().held);
    assert_eq!(
        fx.store.load_session().unwrap(),
        Some(SessionRecord { started_at_secs: 1_700_000_000, duration_secs: 3 })
    );

    tokio::time::sleep(Duration::from_secs(4)).await;
    settle(&fx.handle).await;

    let snapshot = fx.handle.snapshot();
    assert!(!snapshot.active);
    assert!(!snapshot.presentation_visible);
    assert_eq!(snapshot.remaining_secs, 0);

    let log = fx.presentation.log();
    assert_eq!(log.updates, vec![2, 1]);
    assert_eq!(log.live, None);
    assert_eq!(log.shows, 1);
    drop(log);

    assert!(!fx.lock_mode.log().held);
    assert_eq!(fx.store.load_session().unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn no_ticks_after_expiry() {
    let fx = spawn_default();
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(2).await.unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    settle(&fx.handle).await;
    let ended_version = fx.handle.snapshot().version;

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle(&fx.handle).await;

    assert_eq!(fx.handle.snapshot().version, ended_version);
    assert_eq!(fx.presentation.log().updates, vec![1]);
}

#[tokio::test(start_paused = true)]
async fn navigation_keys_are_consumed_only_during_a_session() {
    let fx = spawn_default();
    let back = KeyEvent::down(KeyCode::Back);

    assert_eq!(fx.handle.key_event(back).await.unwrap(), KeyDisposition::Propagate);

    bring_to_front(&fx.handle, NOTES).await;
    fx.handle.start_focus(60).await.unwrap();
    settle(&fx.handle).await;
    assert_eq!(fx.presentation.log().shows, 0);

    assert_eq!(fx.handle.key_event(back).await.unwrap(), KeyDisposition::Consumed);
    assert_eq!(
        fx.handle.key_event(KeyEvent::up(KeyCode::Back)).await.unwrap(),
        KeyDisposition::Propagate
    );
    assert_eq!(
        fx.handle.key_event(KeyEvent::down(KeyCode::Other(24))).await.unwrap(),
        KeyDisposition::Propagate
    );
    settle(&fx.handle).await;
    assert!(fx.handle.snapshot().presentation_visible);

    fx.handle.stop_focus().await.unwrap();
    assert_eq!(fx.handle.key_event(back).await.unwrap(), KeyDisposition::Propagate);
}

#[tokio::test(start_paused = true)]
async fn emergency_exit_ends_the_session() {
    let fx = spawn_default();
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(300).await.unwrap();
    settle(&fx.handle).await;

    fx.handle.emergency_exit().await.unwrap();
    settle(&fx.handle).await;

    assert!(!fx.handle.snapshot().active);
    assert_eq!(fx.presentation.log().live, None);
    assert!(!fx.lock_mode.log().held);
    assert_eq!(fx.store.load_session().unwrap(), None);

    fx.handle.emergency_exit().await.unwrap();
    settle(&fx.handle).await;
    assert_eq!(fx.lock_mode.log().exits, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_queued_before_show_completes_hides_the_late_surface() {
    let fx = spawn_default();
    bring_to_front(&fx.handle, GAME).await;

    let (started, stopped) = tokio::join!(fx.handle.start_focus(300), fx.handle.stop_focus());
    started.unwrap();
    stopped.unwrap();
    settle(&fx.handle).await;

    let log = fx.presentation.log();
    assert_eq!(log.shows, 1);
    assert_eq!(log.hides.len(), 1);
    assert_eq!(log.live, None);
    drop(log);

    let snapshot = fx.handle.snapshot();
    assert!(!snapshot.active);
    assert!(!snapshot.presentation_visible);
}

#[tokio::test(start_paused = true)]
async fn lock_mode_denial_degrades_and_notifies_once() {
    let fx = spawn_with(
        MemorySettingsStore::with_slots([NOTES]),
        RecordingPresentation::default(),
        RecordingLockMode::denying(),
    );
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(300).await.unwrap();
    settle(&fx.handle).await;

    let snapshot = fx.handle.snapshot();
    assert!(snapshot.active);
    assert!(snapshot.degraded);
    assert!(snapshot.presentation_visible);
    assert_eq!(
        fx.presentation.log().notices,
        vec![Notice::LockModeUnavailable { reason: "screen pinning disabled".to_string() }]
    );
    assert_eq!(
        fx.handle.key_event(KeyEvent::down(KeyCode::Home)).await.unwrap(),
        KeyDisposition::Consumed
    );

    fx.handle.stop_focus().await.unwrap();
    settle(&fx.handle).await;

    let lock = fx.lock_mode.log();
    assert_eq!(lock.enters, 1);
    assert_eq!(lock.exits, 0);
    drop(lock);
    assert!(!fx.handle.snapshot().degraded);
}

#[tokio::test(start_paused = true)]
async fn late_lock_denial_does_not_pin_the_next_session() {
    let fx = spawn_with(
        MemorySettingsStore::with_slots([NOTES]),
        RecordingPresentation::default(),
        RecordingLockMode::denying_times(1),
    );
    bring_to_front(&fx.handle, GAME).await;

    // The denial of the first enter arrives after the second session started
    let (first, stopped, second) = tokio::join!(
        fx.handle.start_focus(60),
        fx.handle.stop_focus(),
        fx.handle.start_focus(60),
    );
    first.unwrap();
    stopped.unwrap();
    second.unwrap();
    settle(&fx.handle).await;

    let snapshot = fx.handle.snapshot();
    assert!(snapshot.active);
    assert!(!snapshot.degraded);
    assert!(fx.lock_mode.log().held);
    assert!(fx.presentation.log().notices.is_empty());

    fx.handle.stop_focus().await.unwrap();
    settle(&fx.handle).await;

    let lock = fx.lock_mode.log();
    assert_eq!(lock.enters, 2);
    assert_eq!(lock.exits, 2);
    assert!(!lock.held);
}

#[tokio::test(start_paused = true)]
async fn launching_an_allowed_app_hides_the_surface() {
    let fx = spawn_default();
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(300).await.unwrap();
    settle(&fx.handle).await;
    assert!(fx.handle.snapshot().presentation_visible);

    fx.handle.launch_allowed(NOTES).await.unwrap();
    settle(&fx.handle).await;

    let log = fx.presentation.log();
    assert_eq!(log.launches, vec![NOTES.to_string()]);
    assert_eq!(log.live, None);
    drop(log);
    let snapshot = fx.handle.snapshot();
    assert!(snapshot.active);
    assert!(!snapshot.presentation_visible);
}

#[tokio::test(start_paused = true)]
async fn launching_an_unlisted_app_is_rejected() {
    let fx = spawn_default();
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(300).await.unwrap();
    settle(&fx.handle).await;

    assert_eq!(
        fx.handle.launch_allowed(GAME).await,
        Err(EngineError::Session(SessionError::LaunchNotAllowed { app_id: GAME.to_string() }))
    );
    settle(&fx.handle).await;

    let log = fx.presentation.log();
    assert!(log.launches.is_empty());
    assert!(log.live.is_some());
    assert_eq!(log.shows, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_launch_shows_the_surface_again() {
    let fx = spawn_with(
        MemorySettingsStore::with_slots([NOTES]),
        RecordingPresentation::failing_launches(),
        RecordingLockMode::default(),
    );
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(300).await.unwrap();
    settle(&fx.handle).await;

    fx.handle.launch_allowed(NOTES).await.unwrap();
    settle(&fx.handle).await;

    let log = fx.presentation.log();
    assert!(log.launches.is_empty());
    assert_eq!(log.shows, 2);
    assert!(log.live.is_some());
    drop(log);
    assert!(fx.handle.snapshot().presentation_visible);
}

#[tokio::test(start_paused = true)]
async fn presentation_failure_keeps_key_suppression() {
    let fx = spawn_with(
        MemorySettingsStore::with_slots([NOTES]),
        RecordingPresentation::failing("overlay permission missing"),
        RecordingLockMode::default(),
    );
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(300).await.unwrap();
    settle(&fx.handle).await;

    let snapshot = fx.handle.snapshot();
    assert!(snapshot.active);
    assert!(snapshot.degraded);
    assert!(!snapshot.presentation_visible);
    assert_eq!(
        fx.presentation.log().notices,
        vec![Notice::PresentationUnavailable {
            reason: "presentation permission denied: overlay permission missing".to_string()
        }]
    );
    assert_eq!(
        fx.handle.key_event(KeyEvent::down(KeyCode::Back)).await.unwrap(),
        KeyDisposition::Consumed
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_durations_are_rejected() {
    let fx = spawn_default();

    assert_eq!(
        fx.handle.start_focus(0).await,
        Err(EngineError::Session(SessionError::InvalidDuration { duration_secs: Some(0) }))
    );
    assert_eq!(
        fx.handle.command(HostCommand::StartFocus { duration_secs: None }).await,
        Err(EngineError::Session(SessionError::InvalidDuration { duration_secs: None }))
    );
    assert!(!fx.handle.snapshot().active);
    assert_eq!(fx.store.load_session().unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn unreadable_settings_reject_the_start() {
    let fx = spawn_with(
        ChaoticSettingsStore::always_failing(MemorySettingsStore::with_slots([NOTES])),
        RecordingPresentation::default(),
        RecordingLockMode::default(),
    );
    bring_to_front(&fx.handle, GAME).await;

    let result = fx.handle.start_focus(300).await;

    assert!(matches!(result, Err(EngineError::Storage(StorageError::Io(_)))));
    assert!(!fx.handle.snapshot().active);
    assert_eq!(fx.presentation.log().shows, 0);
    assert_eq!(fx.lock_mode.log().enters, 0);
}

#[tokio::test(start_paused = true)]
async fn stale_session_record_is_cleared_at_startup() {
    let store = MemorySettingsStore::with_slots([NOTES]);
    store.store_session(&SessionRecord { started_at_secs: 42, duration_secs: 300 }).unwrap();

    let fx = spawn_with(store, RecordingPresentation::default(), RecordingLockMode::default());
    settle(&fx.handle).await;

    assert_eq!(fx.store.load_session().unwrap(), None);
    assert!(!fx.handle.snapshot().active);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_the_session_and_hides() {
    let fx = spawn_default();
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(300).await.unwrap();

    fx.handle.shutdown().await;
    fx.engine.await.unwrap();

    assert_eq!(fx.presentation.log().live, None);
    assert!(!fx.lock_mode.log().held);
    assert_eq!(fx.store.load_session().unwrap(), None);
    assert!(!fx.handle.snapshot().active);

    assert_eq!(fx.handle.stop_focus().await, Err(EngineError::Closed));
    assert_eq!(
        fx.handle.key_event(KeyEvent::down(KeyCode::Back)).await,
        Err(EngineError::Closed)
    );
}

#[tokio::test(start_paused = true)]
async fn dropping_every_handle_stops_the_engine() {
    let fx = spawn_default();
    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(300).await.unwrap();
    settle(&fx.handle).await;

    let Fixture { handle, presentation, lock_mode, engine, .. } = fx;
    drop(handle);
    engine.await.unwrap();

    assert_eq!(presentation.log().live, None);
    assert!(!lock_mode.log().held);
}

#[tokio::test(start_paused = true)]
async fn slot_changes_apply_at_the_next_start() {
    let fx = spawn_with(
        MemorySettingsStore::new(),
        RecordingPresentation::default(),
        RecordingLockMode::default(),
    );
    fx.handle.set_slot(0, GAME).await.unwrap();
    bring_to_front(&fx.handle, GAME).await;

    fx.handle.start_focus(300).await.unwrap();
    settle(&fx.handle).await;
    assert_eq!(fx.presentation.log().shows, 0);

    // A running session keeps the list it started with
    fx.handle.clear_slot(0).await.unwrap();
    bring_to_front(&fx.handle, GAME).await;
    settle(&fx.handle).await;
    assert_eq!(fx.presentation.log().shows, 0);

    fx.handle.stop_focus().await.unwrap();
    fx.handle.start_focus(300).await.unwrap();
    settle(&fx.handle).await;
    assert_eq!(fx.presentation.log().shows, 1);

    assert_eq!(
        fx.handle.set_slot(9, NOTES).await,
        Err(EngineError::Storage(StorageError::SlotOutOfRange { slot: 9, max: 6 }))
    );
    assert_eq!(
        fx.handle.set_slot(1, "").await,
        Err(EngineError::Storage(StorageError::EmptyAppId { slot: 1 }))
    );
}

#[tokio::test(start_paused = true)]
async fn snapshot_subscribers_see_increasing_versions() {
    let fx = spawn_default();
    let mut snapshots = fx.handle.subscribe();

    bring_to_front(&fx.handle, GAME).await;
    fx.handle.start_focus(2).await.unwrap();

    let mut versions = Vec::new();
    loop {
        snapshots.changed().await.unwrap();
        let snapshot = *snapshots.borrow_and_update();
        versions.push(snapshot.version);
        if !snapshot.active {
            break;
        }
    }

    assert!(versions.windows(2).all(|pair| pair[0] < pair[1]));
}
