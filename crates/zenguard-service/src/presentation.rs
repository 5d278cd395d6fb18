//! Blocking surface contract.
//!
//! A [`Presentation`] puts the full-screen blocking surface on screen. The
//! engine calls it from its control path, so every method must return
//! promptly; platforms whose show completes later report the handle they
//! created and let the engine reconcile it.
//!
//! The surface also lists the allowed applications. When the user picks one,
//! the engine hides the surface and asks the presentation to launch it.

use thiserror::Error;
use zenguard_core::{AllowList, Notice, PresentationHandle};

/// What the surface should display when shown.
#[derive(Debug, Clone, Copy)]
pub struct ShowRequest<'a> {
    /// Seconds left in the session.
    pub remaining_secs: u32,
    /// Applications the surface may offer to launch.
    pub allow_list: &'a AllowList,
}

/// Reasons a surface could not be shown.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PresentationError {
    /// The platform refused the permission needed to draw over other apps.
    #[error("presentation permission denied: {0}")]
    PermissionDenied(String),

    /// The surface could not be created for another reason.
    #[error("presentation unavailable: {0}")]
    Unavailable(String),
}

/// Full-screen blocking surface.
pub trait Presentation: Send {
    /// Put the surface on screen.
    ///
    /// Idempotent: while a surface is live, returns its handle instead of
    /// creating a second one.
    fn show(&mut self, request: ShowRequest<'_>) -> Result<PresentationHandle, PresentationError>;

    /// Refresh the displayed countdown.
    fn update(&mut self, handle: PresentationHandle, remaining_secs: u32);

    /// Remove the surface. Unknown or already hidden handles are ignored.
    fn hide(&mut self, handle: PresentationHandle);

    /// Raise the surface above whatever is in front.
    fn bring_to_front(&mut self);

    /// Start an allowed application picked on the surface.
    fn launch(&mut self, app_id: &str) -> Result<(), PresentationError>;

    /// Show a one-time notice about reduced enforcement.
    fn notify(&mut self, notice: &Notice) {
        tracing::warn!(?notice, "enforcement notice");
    }
}
