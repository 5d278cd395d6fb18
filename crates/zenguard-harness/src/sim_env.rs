//! Simulated Environment on tokio's virtual clock.
//!
//! `SimEnv` reads time from `tokio::time`, so inside a runtime started with a
//! paused clock (`#[tokio::test(start_paused = true)]`) every sleep resolves
//! as soon as the runtime is idle and time advances deterministically.

use std::time::Duration;

use zenguard_core::env::Environment;

/// Wall-clock origin used by [`SimEnv::new`] (2023-11-14T22:13:20Z).
const DEFAULT_EPOCH_SECS: u64 = 1_700_000_000;

/// Deterministic environment for simulation tests.
#[derive(Debug, Clone)]
pub struct SimEnv {
    epoch_secs: u64,
    origin: tokio::time::Instant,
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl SimEnv {
    /// Create an environment whose wall clock starts at a fixed epoch.
    pub fn new() -> Self {
        Self::at_epoch(DEFAULT_EPOCH_SECS)
    }

    /// Create an environment whose wall clock starts at `epoch_secs`.
    pub fn at_epoch(epoch_secs: u64) -> Self {
        Self { epoch_secs, origin: tokio::time::Instant::now() }
    }
}

impl Environment for SimEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn wall_clock_secs(&self) -> u64 {
        self.epoch_secs + (tokio::time::Instant::now() - self.origin).as_secs()
    }
}
