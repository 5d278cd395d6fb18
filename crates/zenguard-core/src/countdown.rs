//! Session countdown.
//!
//! The countdown owns the remaining duration and the identity of the tick
//! chain currently allowed to decrement it. Ticks themselves come from the
//! driver (one per second); each carries the [`TickChain`] it was spawned
//! for, so a tick that was already queued when the chain was cancelled or
//! re-armed is recognized as stale and has no effect.

use serde::{Deserialize, Serialize};

/// Identity of one armed sequence of ticks.
///
/// Chain ids increase monotonically per [`CountdownTimer`], so a re-armed
/// timer never accepts ticks from an earlier chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TickChain(u64);

impl TickChain {
    /// Raw chain id.
    pub fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TickChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chain#{}", self.0)
    }
}

/// Result of delivering one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tick belongs to a cancelled or superseded chain. Nothing changed.
    Stale,
    /// Countdown decremented; this many seconds remain.
    Remaining(u32),
    /// Countdown reached zero. Reported once, after which the timer is
    /// disarmed.
    Expired,
}

/// Countdown state machine.
#[derive(Debug, Clone, Default)]
pub struct CountdownTimer {
    /// Seconds left on the current (or last) chain.
    remaining_secs: u32,
    /// Chain whose ticks are accepted. `None` when disarmed.
    armed: Option<TickChain>,
    /// Last chain id handed out.
    last_chain: u64,
}

impl CountdownTimer {
    /// Create a disarmed countdown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the countdown for `secs` seconds and return the new chain.
    ///
    /// Any previously armed chain is implicitly cancelled: its ticks become
    /// stale.
    pub fn arm(&mut self, secs: u32) -> TickChain {
        debug_assert!(secs > 0, "countdown armed with zero duration");

        self.last_chain += 1;
        let chain = TickChain(self.last_chain);
        self.armed = Some(chain);
        self.remaining_secs = secs;
        chain
    }

    /// Disarm the countdown.
    ///
    /// Returns the chain that was armed, if any, so the driver can stop its
    /// tick source.
    pub fn cancel(&mut self) -> Option<TickChain> {
        self.armed.take()
    }

    /// Deliver a tick from `chain`.
    pub fn tick(&mut self, chain: TickChain) -> TickOutcome {
        if self.armed != Some(chain) {
            return TickOutcome::Stale;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.armed = None;
            TickOutcome::Expired
        } else {
            TickOutcome::Remaining(self.remaining_secs)
        }
    }

    /// Seconds remaining.
    pub fn snapshot(&self) -> u32 {
        self.remaining_secs
    }

    /// True while a chain is armed.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Currently armed chain. `None` when disarmed.
    pub fn armed_chain(&self) -> Option<TickChain> {
        self.armed
    }
}

/// Render seconds as `MM:SS` for the blocking surface.
///
/// Minutes are not wrapped into hours, so 90 minutes renders as `90:00`.
pub fn format_remaining(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
