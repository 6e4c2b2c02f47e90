//! Session key store.

use crate::device::DeviceKeyProvider;
use crate::error::{VaultError, VaultResult};
use crate::record::KeyRecord;
use crate::store::KeyRecordStore;
use droplit_crypto::{KeyId, MasterKey, Provenance, derive_from_password};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Owns the active master key for one user identity.
///
/// `activate`, restore and `clear` are serialized by a transition lock, and
/// the in-memory slot is swapped only after persistence succeeds, so readers
/// see either the previous key or the new one. Readers get an
/// `Arc<MasterKey>` that stays valid for the whole operation even if the
/// store is cleared meanwhile.
pub struct KeyStore {
    identity: String,
    records: Arc<dyn KeyRecordStore>,
    device: Arc<dyn DeviceKeyProvider>,
    active: RwLock<Option<Arc<MasterKey>>>,
    transition: Mutex<()>,
}

impl KeyStore {
    pub fn new(
        identity: impl Into<String>,
        records: Arc<dyn KeyRecordStore>,
        device: Arc<dyn DeviceKeyProvider>,
    ) -> Self {
        Self {
            identity: identity.into(),
            records,
            device,
            active: RwLock::new(None),
            transition: Mutex::new(()),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Makes `key` the active key and persists its record, replacing any
    /// previous record for this identity.
    ///
    /// Existing drops are not re-encrypted; they keep the key id they were
    /// sealed with.
    pub fn activate(&self, key: MasterKey) -> VaultResult<KeyRecord> {
        let _guard = self.lock_transition();
        self.activate_locked(key)
    }

    /// Activates `key` only if no record is persisted for this identity, or
    /// the persisted record is `allowed`. The check and the write happen
    /// under the transition lock, so of two racing first-time setups exactly
    /// one wins.
    ///
    /// Returns `None`, leaving the store untouched, when another key is
    /// already set up.
    pub fn activate_if_absent(
        &self,
        key: MasterKey,
        allowed: Option<&KeyId>,
    ) -> VaultResult<Option<KeyRecord>> {
        let _guard = self.lock_transition();
        let existing = self.records.load(&self.identity)?;
        if let Some(existing) = existing.filter(|r| Some(&r.key_id) != allowed) {
            warn!(
                "refusing to replace key {} for {} with {}",
                existing.key_id,
                self.identity,
                key.id()
            );
            return Ok(None);
        }
        self.activate_locked(key).map(Some)
    }

    fn activate_locked(&self, key: MasterKey) -> VaultResult<KeyRecord> {
        let wrapping_key = match key.provenance() {
            Provenance::DeviceGenerated => Some(self.device.wrapping_key()?),
            Provenance::PasswordDerived { .. } => None,
        };
        let record = KeyRecord::for_key(&self.identity, &key, wrapping_key.as_ref())?;
        self.records.save(&self.identity, &record)?;

        let previous = self.swap_active(Some(key));
        if let Some(previous) = previous.filter(|p| p.id() != &record.key_id) {
            info!("replaced active key {} for {}", previous.id(), self.identity);
        }
        info!(
            "activated {} key {} for {}",
            record.provenance.kind(),
            record.key_id,
            self.identity
        );
        Ok(record)
    }

    /// Re-derives the persisted password-derived key for a new session.
    ///
    /// A wrong password is detected by the re-derived key id not matching
    /// the record.
    pub fn unlock_with_password(&self, password: &str) -> VaultResult<KeyRecord> {
        let record = self.require_record()?;
        let Provenance::PasswordDerived { salt, params } = &record.provenance else {
            return Err(VaultError::WrongProvenance {
                expected: "password_derived",
                actual: record.provenance.kind(),
            });
        };

        let key = derive_from_password(password, Some(salt), params)?;
        if key.id() != &record.key_id {
            warn!("password unlock rejected for {}", self.identity);
            return Err(VaultError::InvalidPassword);
        }

        let _guard = self.lock_transition();
        // The record may have been replaced while deriving.
        let current = self.require_record()?;
        if current.key_id != record.key_id {
            return Err(VaultError::InvalidPassword);
        }
        self.swap_active(Some(key));
        info!("unlocked key {} for {}", record.key_id, self.identity);
        Ok(record)
    }

    /// Reloads the persisted device-generated key for a new session.
    pub fn load_device_key(&self) -> VaultResult<KeyRecord> {
        let _guard = self.lock_transition();
        let record = self.require_record()?;
        if !matches!(record.provenance, Provenance::DeviceGenerated) {
            return Err(VaultError::WrongProvenance {
                expected: "device_generated",
                actual: record.provenance.kind(),
            });
        }

        let wrapping_key = self.device.wrapping_key()?;
        let key = record.unwrap_key(&self.identity, &wrapping_key)?;
        self.swap_active(Some(key));
        info!("loaded device key {} for {}", record.key_id, self.identity);
        Ok(record)
    }

    /// Whether a key is active in this session.
    pub fn is_ready(&self) -> bool {
        self.read_active().is_some()
    }

    pub fn current_key_id(&self) -> Option<KeyId> {
        self.read_active().map(|key| key.id().clone())
    }

    /// Shared handle to the active key.
    pub fn active_key(&self) -> VaultResult<Arc<MasterKey>> {
        self.read_active().ok_or(VaultError::NotReady)
    }

    /// The record persisted for this identity, if any.
    pub fn persisted_record(&self) -> VaultResult<Option<KeyRecord>> {
        self.records.load(&self.identity)
    }

    /// Drops the in-memory key (sign-out). The persisted record is kept.
    pub fn clear(&self) {
        let _guard = self.lock_transition();
        if let Some(previous) = self.swap_active(None) {
            debug!("cleared key {} for {}", previous.id(), self.identity);
        }
    }

    /// Deletes the persisted record and clears the session key.
    pub fn delete_record(&self) -> VaultResult<bool> {
        let _guard = self.lock_transition();
        let existed = self.records.delete(&self.identity)?;
        self.swap_active(None);
        info!("deleted key record for {} (existed: {existed})", self.identity);
        Ok(existed)
    }

    fn require_record(&self) -> VaultResult<KeyRecord> {
        self.records
            .load(&self.identity)?
            .ok_or_else(|| VaultError::RecordNotFound(self.identity.clone()))
    }

    fn read_active(&self) -> Option<Arc<MasterKey>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn swap_active(&self, key: Option<MasterKey>) -> Option<Arc<MasterKey>> {
        let mut slot = self.active.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, key.map(Arc::new))
    }

    fn lock_transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("identity", &self.identity)
            .field("active", &self.current_key_id())
            .finish()
    }
}
