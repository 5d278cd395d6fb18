//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold during session execution.
//! Unlike example-based tests that check specific scenarios, invariants
//! verify behavioral properties across all possible event orderings.
//!
//! # Architecture
//!
//! The invariant system extracts observable state from the controller and the
//! simulated collaborators into a [`SessionObservation`], then runs registered
//! [`Invariant`] checks against it. Violations trigger panics with detailed
//! context for debugging.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let observation = driver.observe();
//! registry.check_all(&observation)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    BlockedAppCovered, LockModeReleasedWhenIdle, PresentationRequiresSession, SessionsEndOnce,
    SinglePresentation, SnapshotVersionsIncrease, TimerMatchesSession,
};
pub use snapshot::SessionObservation;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against session state.
///
/// Invariants are behavioral properties that must always hold.
/// They capture WHAT must be true, not specific test scenarios.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current observation.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &SessionObservation) -> InvariantResult;

    /// Build a violation for this invariant.
    fn violation(&self, message: String) -> Violation {
        Violation { invariant: self.name(), message }
    }
}

/// Registry of invariants to check.
///
/// Collects multiple invariants and runs them all against session state.
/// Use [`InvariantRegistry::standard()`] for the session invariants.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard session invariants.
    ///
    /// Includes:
    /// - [`PresentationRequiresSession`]: no surface outside a session
    /// - [`TimerMatchesSession`]: tick chain armed iff active
    /// - [`SinglePresentation`]: at most one surface on screen
    /// - [`BlockedAppCovered`]: a blocked app is always covered
    /// - [`LockModeReleasedWhenIdle`]: lock mode never outlives the session
    /// - [`SessionsEndOnce`]: one end notification per start
    /// - [`SnapshotVersionsIncrease`]: published versions strictly increase
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(PresentationRequiresSession);
        registry.add(TimerMatchesSession);
        registry.add(SinglePresentation);
        registry.add(BlockedAppCovered);
        registry.add(LockModeReleasedWhenIdle);
        registry.add(SessionsEndOnce);
        registry.add(SnapshotVersionsIncrease);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &SessionObservation) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking on first violation.
    ///
    /// Use this in tests where you want immediate failure with context.
    pub fn assert_all(&self, state: &SessionObservation, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
