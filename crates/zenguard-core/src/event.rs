//! Session input events.
//!
//! This module defines [`SessionEvent`], the complete set of inputs that drive
//! the [`crate::SessionController`].
//!
//! Events originate from four sources:
//! - Host commands (start/stop) and the user's actions on the blocking
//!   surface (emergency exit, launching an allowed application).
//! - Foreground-change and key notifications from the operating system.
//! - Ticks from the countdown's tick source.
//! - Completion reports from the presentation and lock-mode collaborators,
//!   including failed launches.

use serde::{Deserialize, Serialize};

use crate::{AllowList, AppId, TickChain};

/// Opaque identifier of a shown blocking surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PresentationHandle(u64);

impl PresentationHandle {
    /// Wrap a presentation-assigned id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Countdown reached zero.
    Expired,
    /// User activated the emergency exit.
    UserExit,
    /// Host sent a stop command.
    HostStop,
    /// Host tore the engine down or interrupted it.
    Interrupted,
}

/// Commands the host sends over its signaling channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum HostCommand {
    /// Begin a session. The duration is validated by the controller.
    StartFocus {
        /// Requested duration. `None` if the host omitted it.
        #[serde(default)]
        duration_secs: Option<i64>,
    },
    /// End the current session.
    StopFocus,
}

/// One foreground-change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundChange {
    /// Application now in front. `None` if the host could not resolve it.
    pub app_id: Option<AppId>,
    /// When the host observed the change (seconds since the Unix epoch).
    #[serde(default)]
    pub timestamp_secs: u64,
}

impl ForegroundChange {
    /// Resolved foreground application.
    pub fn resolved(app_id: impl Into<String>, timestamp_secs: u64) -> Self {
        Self { app_id: Some(app_id.into()), timestamp_secs }
    }

    /// Host could not tell which application is in front.
    pub fn unresolved(timestamp_secs: u64) -> Self {
        Self { app_id: None, timestamp_secs }
    }
}

/// Navigation-relevant key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    /// Back gesture or button.
    Back,
    /// Home gesture or button.
    Home,
    /// Recent-apps gesture or button.
    AppSwitch,
    /// Any other key, by host key code.
    Other(u32),
}

impl KeyCode {
    /// True for keys that would navigate away from the blocking surface.
    pub fn is_navigation(self) -> bool {
        matches!(self, Self::Back | Self::Home | Self::AppSwitch)
    }
}

/// Key event phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPhase {
    /// Key pressed.
    Down,
    /// Key released.
    Up,
    /// Auto-repeat while held.
    Repeat,
}

/// One key notification from the host input subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Which key.
    pub code: KeyCode,
    /// Press, release or repeat.
    pub phase: KeyPhase,
}

impl KeyEvent {
    /// Key pressed.
    pub fn down(code: KeyCode) -> Self {
        Self { code, phase: KeyPhase::Down }
    }

    /// Key released.
    pub fn up(code: KeyCode) -> Self {
        Self { code, phase: KeyPhase::Up }
    }
}

/// Events processed by the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Start a session.
    Start {
        /// Requested duration in seconds, as received from the host.
        duration_secs: Option<i64>,
        /// Allow-list read from the settings store at start.
        allow_list: AllowList,
    },

    /// Stop the current session.
    Stop {
        /// Trigger of the stop.
        reason: StopReason,
    },

    /// Foreground application changed.
    ForegroundChanged(ForegroundChange),

    /// Key notification.
    Key(KeyEvent),

    /// One-second tick from a tick chain.
    TimerTick {
        /// Chain that produced the tick.
        chain: TickChain,
    },

    /// User activated the emergency exit on the blocking surface.
    EmergencyExit,

    /// A previously requested presentation is now on screen.
    PresentationShown {
        /// Handle of the shown surface.
        handle: PresentationHandle,
    },

    /// A previously requested presentation could not be shown.
    PresentationFailed {
        /// Platform-provided reason.
        reason: String,
    },

    /// Lock mode was refused by the platform.
    LockModeDenied {
        /// Chain of the session that requested lock mode.
        chain: TickChain,
        /// Platform-provided reason.
        reason: String,
    },

    /// User picked an application on the blocking surface.
    LaunchRequested {
        /// Application to launch.
        app_id: AppId,
    },

    /// A previously requested launch did not happen.
    LaunchFailed {
        /// Application that could not be launched.
        app_id: AppId,
        /// Platform-provided reason.
        reason: String,
    },
}
