//! Session side-effects and intents.
//!
//! [`SessionAction`] is what the [`crate::SessionController`] asks its driver
//! to do. Actions are returned in the order they must be executed; a stop, for
//! example, always yields `CancelTimer`, then `HidePresentation`, then
//! `ExitLockMode`.

use crate::{
    AllowList, AppId, KeyCode, PresentationHandle, SessionSnapshot, StopReason, TickChain,
};

/// One-time notices surfaced to the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Lock mode was refused; enforcement continues with overlay and key
    /// suppression only.
    LockModeUnavailable {
        /// Platform-provided reason.
        reason: String,
    },
    /// The blocking surface could not be shown; enforcement continues with
    /// key suppression and redirects only.
    PresentationUnavailable {
        /// Platform-provided reason.
        reason: String,
    },
}

/// Actions produced by the session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Start a one-second tick source for `chain`.
    ArmTimer {
        /// Chain the ticks must carry.
        chain: TickChain,
        /// Session length, for diagnostics.
        duration_secs: u32,
    },

    /// Stop the tick source for `chain`.
    CancelTimer {
        /// Chain to stop.
        chain: TickChain,
    },

    /// Request the platform's restricted-input mode.
    ///
    /// A denial is reported with [`crate::SessionEvent::LockModeDenied`]
    /// carrying the same chain.
    EnterLockMode {
        /// Chain of the requesting session.
        chain: TickChain,
    },

    /// Release the restricted-input mode.
    ExitLockMode,

    /// Put the blocking surface on screen.
    ///
    /// The driver reports the outcome with
    /// [`crate::SessionEvent::PresentationShown`] or
    /// [`crate::SessionEvent::PresentationFailed`].
    ShowPresentation {
        /// Seconds to display.
        remaining_secs: u32,
        /// Applications the surface may offer to launch.
        allow_list: AllowList,
    },

    /// Refresh the countdown shown on the surface.
    UpdatePresentation {
        /// Surface to update.
        handle: PresentationHandle,
        /// Seconds to display.
        remaining_secs: u32,
    },

    /// Remove the blocking surface.
    HidePresentation {
        /// Surface to remove.
        handle: PresentationHandle,
    },

    /// Raise the blocking surface above whatever raced it to the front.
    BringToFront,

    /// Launch an allow-listed application picked on the blocking surface.
    ///
    /// A failed launch is reported with [`crate::SessionEvent::LaunchFailed`].
    LaunchApp {
        /// Application to launch.
        app_id: AppId,
    },

    /// Swallow the key instead of letting the host navigate.
    ConsumeKey {
        /// Suppressed key.
        code: KeyCode,
    },

    /// A session began.
    SessionStarted {
        /// Validated session length.
        duration_secs: u32,
    },

    /// The session ended. Emitted exactly once per session.
    SessionEnded {
        /// Trigger of the stop.
        reason: StopReason,
    },

    /// Show a one-time notice to the user.
    Notice(Notice),

    /// Publish a new observable snapshot.
    PublishSnapshot(SessionSnapshot),
}
