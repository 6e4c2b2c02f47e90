//! Key record persistence seam.

use crate::error::{VaultError, VaultResult};
use crate::record::KeyRecord;
use std::collections::HashMap;
use std::sync::Mutex;

/// Persists at most one [`KeyRecord`] per user identity.
///
/// `save` replaces whatever record the identity had before.
pub trait KeyRecordStore: Send + Sync {
    fn load(&self, identity: &str) -> VaultResult<Option<KeyRecord>>;

    fn save(&self, identity: &str, record: &KeyRecord) -> VaultResult<()>;

    /// Returns whether a record existed.
    fn delete(&self, identity: &str) -> VaultResult<bool>;
}

/// Process-local store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeyRecordStore {
    records: Mutex<HashMap<String, KeyRecord>>,
}

impl MemoryKeyRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyRecordStore for MemoryKeyRecordStore {
    fn load(&self, identity: &str) -> VaultResult<Option<KeyRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        Ok(records.get(identity).cloned())
    }

    fn save(&self, identity: &str, record: &KeyRecord) -> VaultResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        records.insert(identity.to_string(), record.clone());
        Ok(())
    }

    fn delete(&self, identity: &str) -> VaultResult<bool> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        Ok(records.remove(identity).is_some())
    }
}
