//! Core state machines for zenguard focus sessions
//!
//! Pure, I/O-free logic for enforcing a self-imposed focus session: the
//! allow-list policy, the countdown, and the session controller that ties them
//! together. Hosts feed [`SessionEvent`]s in and execute the returned
//! [`SessionAction`]s, so the same code runs under the async engine and in
//! deterministic tests.
//!
//! # Components
//!
//! - [`policy`]: allow/block decision for a foreground application
//! - [`CountdownTimer`]: remaining time and tick-chain identity
//! - [`SessionController`]: the session state machine
//! - [`env::Environment`]: time abstraction used by drivers

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod countdown;
pub mod env;
pub mod error;
pub mod event;
pub mod policy;
pub mod session;
pub mod snapshot;

pub use action::{Notice, SessionAction};
pub use countdown::{CountdownTimer, TickChain, TickOutcome, format_remaining};
pub use error::SessionError;
pub use event::{
    ForegroundChange, HostCommand, KeyCode, KeyEvent, KeyPhase, PresentationHandle,
    SessionEvent, StopReason,
};
pub use policy::{
    AllowList, AppId, Decision, MAX_ALLOW_LIST_SLOTS, UnresolvedDisposition, Verdict, decide,
};
pub use session::{
    DEFAULT_SELF_ID, LockModeState, PresentationSlot, SessionConfig, SessionController,
    SessionState,
};
pub use snapshot::SessionSnapshot;
