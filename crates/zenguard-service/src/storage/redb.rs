//! Redb-backed durable settings store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety, so a
//! session record written at start survives a crash of the engine and is
//! found again on the next start.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};

use super::{
    AllowListSlots, SessionRecord, SettingsStore, StorageError, check_slot, check_slot_write,
};

/// Table: slots
/// Key: slot index
/// Value: application id (UTF-8)
const SLOTS: TableDefinition<u8, &str> = TableDefinition::new("slots");

/// Table: session
/// Key: [`SESSION_KEY`]
/// Value: CBOR-encoded SessionRecord
const SESSION: TableDefinition<&str, &[u8]> = TableDefinition::new("session");

const SESSION_KEY: &str = "current";

/// Durable settings store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbSettingsStore {
    db: Arc<Database>,
}

impl RedbSettingsStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (SLOTS, SESSION).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(SLOTS).map_err(io)?;
            let _ = txn.open_table(SESSION).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl SettingsStore for RedbSettingsStore {
    fn load_slots(&self) -> Result<AllowListSlots, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(SLOTS).map_err(io)?;

        let mut slots = AllowListSlots::default();
        for result in table.iter().map_err(io)? {
            let (key, value) = result.map_err(io)?;
            let index = usize::from(key.value());
            match slots.get_mut(index) {
                Some(slot) => *slot = Some(value.value().to_string()),
                None => tracing::warn!(slot = index, "ignoring stored slot past the last slot"),
            }
        }

        Ok(slots)
    }

    fn set_slot(&self, slot: usize, app_id: &str) -> Result<(), StorageError> {
        check_slot_write(slot, app_id)?;
        let key = slot_key(slot)?;

        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(SLOTS).map_err(io)?;
            table.insert(key, app_id).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(())
    }

    fn clear_slot(&self, slot: usize) -> Result<(), StorageError> {
        check_slot(slot)?;
        let key = slot_key(slot)?;

        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(SLOTS).map_err(io)?;
            table.remove(key).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(())
    }

    fn load_session(&self) -> Result<Option<SessionRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(SESSION).map_err(io)?;

        match table.get(SESSION_KEY).map_err(io)? {
            Some(value) => {
                let record: SessionRecord = ciborium::from_reader(value.value())
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(record))
            },
            None => Ok(None),
        }
    }

    fn store_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(record, &mut bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(SESSION).map_err(io)?;
            table.insert(SESSION_KEY, bytes.as_slice()).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(())
    }

    fn clear_session(&self) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(SESSION).map_err(io)?;
            table.remove(SESSION_KEY).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(())
    }
}

fn io(err: impl std::fmt::Display) -> StorageError {
    StorageError::Io(err.to_string())
}

fn slot_key(slot: usize) -> Result<u8, StorageError> {
    u8::try_from(slot).map_err(|_| StorageError::SlotOutOfRange {
        slot,
        max: zenguard_core::MAX_ALLOW_LIST_SLOTS,
    })
}
