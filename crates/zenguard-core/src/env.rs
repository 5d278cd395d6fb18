//! Environment abstraction for deterministic testing.
//!
//! Decouples drivers from system time. The session controller itself never
//! reads a clock; drivers use an [`Environment`] to pace tick chains and to
//! timestamp host events, so tests can substitute virtual time.

use std::time::Duration;

/// Abstract environment providing time and async sleeping.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments may use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code (not session logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Seconds since the Unix epoch, used to timestamp host events.
    fn wall_clock_secs(&self) -> u64;
}
