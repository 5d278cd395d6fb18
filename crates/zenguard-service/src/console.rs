//! Console collaborators for the `zenguard` binary.
//!
//! Without a windowing platform the blocking surface and lock mode are
//! rendered as log lines, which makes the engine observable end to end from
//! a terminal.

use zenguard_core::{Notice, PresentationHandle, format_remaining};

use crate::{
    lock_mode::{LockMode, LockModeDenied},
    presentation::{Presentation, PresentationError, ShowRequest},
};

/// Blocking surface rendered as log lines.
#[derive(Debug, Default)]
pub struct ConsolePresentation {
    next_id: u64,
    live: Option<PresentationHandle>,
    launched: Vec<String>,
}

impl ConsolePresentation {
    /// Create a console presentation with nothing on screen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface currently on screen.
    pub fn live(&self) -> Option<PresentationHandle> {
        self.live
    }

    /// Applications launched so far, oldest first.
    pub fn launched(&self) -> &[String] {
        &self.launched
    }
}

impl Presentation for ConsolePresentation {
    fn show(&mut self, request: ShowRequest<'_>) -> Result<PresentationHandle, PresentationError> {
        if let Some(handle) = self.live {
            return Ok(handle);
        }

        self.next_id += 1;
        let handle = PresentationHandle::new(self.next_id);
        self.live = Some(handle);

        let allowed: Vec<&str> = request.allow_list.iter().collect();
        tracing::info!(
            handle = handle.id(),
            remaining = %format_remaining(request.remaining_secs),
            ?allowed,
            "blocking surface shown"
        );
        Ok(handle)
    }

    fn update(&mut self, handle: PresentationHandle, remaining_secs: u32) {
        if self.live == Some(handle) {
            tracing::info!(remaining = %format_remaining(remaining_secs), "focus");
        }
    }

    fn hide(&mut self, handle: PresentationHandle) {
        if self.live == Some(handle) {
            self.live = None;
            tracing::info!(handle = handle.id(), "blocking surface hidden");
        }
    }

    fn bring_to_front(&mut self) {
        if let Some(handle) = self.live {
            tracing::debug!(handle = handle.id(), "blocking surface raised");
        }
    }

    fn launch(&mut self, app_id: &str) -> Result<(), PresentationError> {
        tracing::info!(%app_id, "launching allowed app");
        self.launched.push(app_id.to_owned());
        Ok(())
    }

    fn notify(&mut self, notice: &Notice) {
        match notice {
            Notice::LockModeUnavailable { reason } => {
                tracing::warn!(%reason, "lock mode unavailable, navigation keys are still blocked");
            },
            Notice::PresentationUnavailable { reason } => {
                tracing::warn!(%reason, "blocking surface unavailable, redirecting apps instead");
            },
        }
    }
}

/// Lock mode rendered as log lines.
///
/// With `deny` set, every request is refused, which exercises the degraded
/// enforcement path.
#[derive(Debug, Default)]
pub struct ConsoleLockMode {
    deny: bool,
    held: bool,
}

impl ConsoleLockMode {
    /// Lock mode that grants every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock mode that refuses every request.
    pub fn denying() -> Self {
        Self { deny: true, held: false }
    }

    /// True while the mode is held.
    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl LockMode for ConsoleLockMode {
    fn enter(&mut self) -> Result<(), LockModeDenied> {
        if self.deny {
            return Err(LockModeDenied::new("disabled on the command line"));
        }
        self.held = true;
        tracing::info!("lock mode entered");
        Ok(())
    }

    fn exit(&mut self) -> Result<(), LockModeDenied> {
        if self.held {
            self.held = false;
            tracing::info!("lock mode released");
        }
        Ok(())
    }
}
