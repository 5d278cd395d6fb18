//! Chaotic settings store for fault injection testing
//!
//! Store wrapper that randomly fails operations, used to verify that storage
//! failures never lock the user into a session.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use super::{AllowListSlots, SessionRecord, SettingsStore, StorageError};

/// Store wrapper that randomly injects `StorageError::Io` failures.
///
/// Delegates to an underlying store but fails each operation with the
/// configured probability. Deterministic for a given seed.
#[derive(Clone)]
pub struct ChaoticSettingsStore<S: SettingsStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
}

/// Linear congruential generator, reproducible for a given seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    /// Next value in `[0.0, 1.0)`.
    #[allow(clippy::cast_precision_loss)]
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: SettingsStore> ChaoticSettingsStore<S> {
    /// Wrap `inner`, failing operations with probability `failure_rate`.
    ///
    /// The rate is clamped to `[0.0, 1.0]`.
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Arc::new(Mutex::new(ChaoticRng { state: seed })),
        }
    }

    /// Wrapper that fails every operation.
    pub fn always_failing(inner: S) -> Self {
        Self::with_seed(inner, 1.0, 0)
    }

    /// Underlying store (for checking state after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn roll(&self, operation: &'static str) -> Result<(), StorageError> {
        let fail = match self.rng.lock() {
            Ok(mut rng) => rng.next() < self.failure_rate,
            Err(_) => true,
        };
        if fail {
            tracing::debug!(operation, "injecting storage failure");
            return Err(StorageError::Io(format!("injected failure in {operation}")));
        }
        Ok(())
    }
}

impl<S: SettingsStore> SettingsStore for ChaoticSettingsStore<S> {
    fn load_slots(&self) -> Result<AllowListSlots, StorageError> {
        self.roll("load_slots")?;
        self.inner.load_slots()
    }

    fn set_slot(&self, slot: usize, app_id: &str) -> Result<(), StorageError> {
        self.roll("set_slot")?;
        self.inner.set_slot(slot, app_id)
    }

    fn clear_slot(&self, slot: usize) -> Result<(), StorageError> {
        self.roll("clear_slot")?;
        self.inner.clear_slot(slot)
    }

    fn load_session(&self) -> Result<Option<SessionRecord>, StorageError> {
        self.roll("load_session")?;
        self.inner.load_session()
    }

    fn store_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.roll("store_session")?;
        self.inner.store_session(record)
    }

    fn clear_session(&self) -> Result<(), StorageError> {
        self.roll("clear_session")?;
        self.inner.clear_session()
    }
}
