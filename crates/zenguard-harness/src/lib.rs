//! Deterministic simulation harness for zenguard session testing.
//!
//! Drives a [`zenguard_core::SessionController`] the way the async engine
//! does, but synchronously: actions are executed against in-memory stand-ins
//! for the presentation, lock mode and tick source, and completion reports
//! are queued behind whatever the test injects next.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the session
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod operation;
pub mod sim_driver;
pub mod sim_env;

pub use invariants::{
    BlockedAppCovered, Invariant, InvariantRegistry, InvariantResult, LockModeReleasedWhenIdle,
    PresentationRequiresSession, SessionObservation, SessionsEndOnce, SinglePresentation,
    SnapshotVersionsIncrease, TimerMatchesSession, Violation,
};
pub use operation::{ModelApp, Operation};
pub use sim_driver::{FaultPlan, SimDriver};
pub use sim_env::SimEnv;
