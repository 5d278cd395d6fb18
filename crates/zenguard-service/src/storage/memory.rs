#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    AllowListSlots, SessionRecord, SettingsStore, StorageError, check_slot, check_slot_write,
};

/// In-memory settings store for tests and the binary's default mode.
///
/// All state is wrapped in `Arc<Mutex<>>` so clones share it. A poisoned lock
/// surfaces as `StorageError::Io` rather than a panic.
#[derive(Clone, Default)]
pub struct MemorySettingsStore {
    inner: Arc<Mutex<MemorySettingsInner>>,
}

#[derive(Default)]
struct MemorySettingsInner {
    slots: AllowListSlots,
    session: Option<SessionRecord>,
}

impl MemorySettingsStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose first slots hold `ids`.
    ///
    /// Ids past the last slot are ignored.
    pub fn with_slots<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            for (slot, id) in inner.slots.iter_mut().zip(ids) {
                *slot = Some(id.into());
            }
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemorySettingsInner>, StorageError> {
        self.inner.lock().map_err(|_| StorageError::Io("settings mutex poisoned".into()))
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load_slots(&self) -> Result<AllowListSlots, StorageError> {
        Ok(self.lock()?.slots.clone())
    }

    fn set_slot(&self, slot: usize, app_id: &str) -> Result<(), StorageError> {
        check_slot_write(slot, app_id)?;
        self.lock()?.slots[slot] = Some(app_id.to_string());
        Ok(())
    }

    fn clear_slot(&self, slot: usize) -> Result<(), StorageError> {
        check_slot(slot)?;
        self.lock()?.slots[slot] = None;
        Ok(())
    }

    fn load_session(&self) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self.lock()?.session)
    }

    fn store_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.lock()?.session = Some(*record);
        Ok(())
    }

    fn clear_session(&self) -> Result<(), StorageError> {
        self.lock()?.session = None;
        Ok(())
    }
}
