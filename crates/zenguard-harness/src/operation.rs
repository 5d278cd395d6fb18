//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to a session. They are
//! generated randomly by proptest and applied through [`crate::SimDriver`],
//! which checks invariants after each one.

use zenguard_core::{AllowList, DEFAULT_SELF_ID, KeyCode, KeyPhase, StopReason};

/// Foreground applications the model can bring to the front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelApp {
    /// Allow-listed application.
    Notes,
    /// Application outside the allow-list.
    Browser,
    /// Another application outside the allow-list.
    Game,
    /// The engine's own application.
    Zenguard,
    /// Host could not resolve the foreground.
    Unresolved,
}

impl ModelApp {
    /// The single allow-listed application id.
    pub const ALLOWED_ID: &'static str = "com.example.notes";

    /// Every model application.
    pub const ALL: [Self; 5] =
        [Self::Notes, Self::Browser, Self::Game, Self::Zenguard, Self::Unresolved];

    /// Identifier reported by the host. `None` if unresolved.
    pub fn app_id(self) -> Option<&'static str> {
        match self {
            Self::Notes => Some(Self::ALLOWED_ID),
            Self::Browser => Some("org.example.browser"),
            Self::Game => Some("com.example.game"),
            Self::Zenguard => Some(DEFAULT_SELF_ID),
            Self::Unresolved => None,
        }
    }

    /// Allow-list used by model sessions.
    pub fn allow_list() -> AllowList {
        AllowList::from_ids([Self::ALLOWED_ID])
    }

    /// True if the default policy blocks this application.
    pub fn is_blocked(self) -> bool {
        matches!(self, Self::Browser | Self::Game)
    }
}

/// Operations that can be applied to a simulated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Host starts a session. Invalid durations are part of the space.
    Start {
        /// Requested duration.
        duration_secs: i64,
    },

    /// Host or user stops the session.
    Stop {
        /// Reported trigger.
        reason: StopReason,
    },

    /// Foreground application changed.
    Foreground {
        /// New foreground application.
        app: ModelApp,
    },

    /// Key notification.
    Key {
        /// Which key.
        code: KeyCode,
        /// Press, release or repeat.
        phase: KeyPhase,
    },

    /// One second passes on the armed tick chain.
    Tick,

    /// A tick from a chain that has since been cancelled.
    StaleTick,

    /// User activates the emergency exit.
    EmergencyExit,

    /// User picks an application on the blocking surface.
    Launch {
        /// Requested application. Blocked and unresolved apps are rejected.
        app: ModelApp,
    },

    /// Deliver the oldest queued completion report.
    DeliverFeedback,

    /// Deliver every queued completion report.
    Settle,
}
