//! Settings storage for zenguard.
//!
//! Trait-based abstraction for persisting the allow-list slots and the record
//! of the session in progress. The trait is synchronous (no async): every
//! call is a short read or write made from the engine's control path.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticSettingsStore;
pub use error::StorageError;
pub use memory::MemorySettingsStore;
use serde::{Deserialize, Serialize};
use zenguard_core::{AllowList, AppId, MAX_ALLOW_LIST_SLOTS};

pub use self::redb::RedbSettingsStore;

/// Persisted allow-list slots, in display order.
pub type AllowListSlots = [Option<AppId>; MAX_ALLOW_LIST_SLOTS];

/// Record of the session in progress.
///
/// Present exactly while the engine runs a session. A record found when the
/// engine starts belongs to a session that never ended cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unix timestamp (seconds) when the session started.
    pub started_at_secs: u64,
    /// Validated session length.
    pub duration_secs: u32,
}

/// Storage abstraction for allow-list slots and the session record.
///
/// Must be Clone (shared by the engine and its host), Send + Sync, and
/// synchronous. Implementations share internal state via Arc, so clones
/// access the same underlying storage.
pub trait SettingsStore: Clone + Send + Sync + 'static {
    /// Load all slots. Unset slots are `None`.
    fn load_slots(&self) -> Result<AllowListSlots, StorageError>;

    /// Store `app_id` in `slot`, replacing its previous content.
    ///
    /// # Errors
    ///
    /// - `StorageError::SlotOutOfRange` if `slot >= MAX_ALLOW_LIST_SLOTS`
    /// - `StorageError::EmptyAppId` if `app_id` is empty
    fn set_slot(&self, slot: usize, app_id: &str) -> Result<(), StorageError>;

    /// Clear `slot`. Clearing an unset slot is a no-op.
    fn clear_slot(&self, slot: usize) -> Result<(), StorageError>;

    /// Load the record of the session in progress.
    ///
    /// Returns `None` if no session is recorded.
    fn load_session(&self) -> Result<Option<SessionRecord>, StorageError>;

    /// Record the session in progress, replacing any previous record.
    fn store_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Remove the session record. No-op if none is stored.
    fn clear_session(&self) -> Result<(), StorageError>;

    /// Allow-list assembled from the slots.
    ///
    /// Gaps are skipped and duplicate slots collapse into one entry.
    fn allow_list(&self) -> Result<AllowList, StorageError> {
        Ok(AllowList::from_slots(self.load_slots()?))
    }
}

/// Reject slot indexes past the last slot.
pub(crate) fn check_slot(slot: usize) -> Result<(), StorageError> {
    if slot >= MAX_ALLOW_LIST_SLOTS {
        return Err(StorageError::SlotOutOfRange { slot, max: MAX_ALLOW_LIST_SLOTS });
    }
    Ok(())
}

/// Validate a slot write.
pub(crate) fn check_slot_write(slot: usize, app_id: &str) -> Result<(), StorageError> {
    check_slot(slot)?;
    if app_id.is_empty() {
        return Err(StorageError::EmptyAppId { slot });
    }
    Ok(())
}
