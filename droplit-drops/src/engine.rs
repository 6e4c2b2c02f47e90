//! Field-level encryption of drops.
//!
//! Each field named in a level's scope is serialized to JSON and sealed on its
//! own with a fresh nonce. The associated data binds the drop id, field name,
//! level and key id, so a sealed value cannot be moved to another drop or
//! field, or relabeled, without failing authentication.
//!
//! The engine holds no state. Keys are borrowed for the duration of a call,
//! so independent drops can be processed concurrently.

use crate::error::{DropError, DropResult};
use crate::policy::{PrivacyLevel, scope_for};
use crate::types::{DropRecord, EncryptedDrop, SealedField};
use droplit_crypto::{EncryptedData, KeyId, MasterKey, decrypt, encrypt};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// What to do when a drop in a batch cannot be decrypted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Abort on the first failure and return its error.
    FailFast,
    /// Decrypt everything possible and list the failures.
    #[default]
    SkipAndReport,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub drop_id: String,
    pub error: DropError,
}

/// Outcome of [`decrypt_batch`]. `decrypted` keeps input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub decrypted: Vec<DropRecord>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Ids of drops that failed because they were sealed with another key.
    pub fn key_mismatches(&self) -> impl Iterator<Item = &str> {
        self.failures
            .iter()
            .filter(|f| f.error.is_key_mismatch())
            .map(|f| f.drop_id.as_str())
    }
}

/// Seals every field of `drop` that `level` covers. Other fields pass
/// through unchanged.
pub fn encrypt_drop(
    drop: &DropRecord,
    level: PrivacyLevel,
    key: &MasterKey,
) -> DropResult<EncryptedDrop> {
    let scope = scope_for(level);
    let mut plain = BTreeMap::new();
    let mut sealed = BTreeMap::new();

    for (name, value) in &drop.fields {
        if scope.contains(name) {
            sealed.insert(name.clone(), seal_field(&drop.id, name, value, level, key)?);
        } else {
            plain.insert(name.clone(), value.clone());
        }
    }

    debug!(
        "sealed {} field(s) of drop {} at {level} with key {}",
        sealed.len(),
        drop.id,
        key.id()
    );
    Ok(EncryptedDrop {
        id: drop.id.clone(),
        level,
        key_id: (!sealed.is_empty()).then(|| key.id().clone()),
        plain,
        sealed,
    })
}

/// Restores the plaintext drop.
///
/// Every sealed field must carry `key`'s id ([`DropError::KeyMismatch`]
/// otherwise) and must authenticate ([`DropError::Tamper`] otherwise).
pub fn decrypt_drop(drop: &EncryptedDrop, key: &MasterKey) -> DropResult<DropRecord> {
    check_structure(drop)?;

    let mut fields = drop.plain.clone();
    for (name, field) in &drop.sealed {
        let value = open_field(&drop.id, name, field, key)?;
        fields.insert(name.clone(), value);
    }

    Ok(DropRecord {
        id: drop.id.clone(),
        fields,
    })
}

/// Moves a drop to `new_level`.
///
/// Raising seals only the fields the new scope adds; fields already sealed
/// are kept as they are. Lowering opens the fields the new scope no longer
/// covers and stores them as plaintext. `key` must be the key that sealed the
/// drop.
pub fn change_level(
    drop: &EncryptedDrop,
    new_level: PrivacyLevel,
    key: &MasterKey,
) -> DropResult<EncryptedDrop> {
    check_structure(drop)?;
    if let Some((field, expected)) = first_foreign_field(drop, key.id()) {
        return Err(key_mismatch(&drop.id, field, expected, key.id()));
    }
    if new_level == drop.level {
        return Ok(drop.clone());
    }

    let new_scope = scope_for(new_level);
    let mut plain = BTreeMap::new();
    let mut sealed = BTreeMap::new();

    for (name, value) in &drop.plain {
        if new_scope.contains(name) {
            sealed.insert(name.clone(), seal_field(&drop.id, name, value, new_level, key)?);
        } else {
            plain.insert(name.clone(), value.clone());
        }
    }
    for (name, field) in &drop.sealed {
        if new_scope.contains(name) {
            sealed.insert(name.clone(), field.clone());
        } else {
            plain.insert(name.clone(), open_field(&drop.id, name, field, key)?);
        }
    }

    debug!(
        "changed drop {} from {} to {new_level} ({} sealed, {} plain)",
        drop.id,
        drop.level,
        sealed.len(),
        plain.len()
    );
    Ok(EncryptedDrop {
        id: drop.id.clone(),
        level: new_level,
        key_id: (!sealed.is_empty()).then(|| key.id().clone()),
        plain,
        sealed,
    })
}

/// Re-seals a drop under `new_key` at its current level.
pub fn rekey_drop(
    drop: &EncryptedDrop,
    old_key: &MasterKey,
    new_key: &MasterKey,
) -> DropResult<EncryptedDrop> {
    let plain = decrypt_drop(drop, old_key)?;
    let rekeyed = encrypt_drop(&plain, drop.level, new_key)?;
    debug!("re-keyed drop {} from {} to {}", drop.id, old_key.id(), new_key.id());
    Ok(rekeyed)
}

/// Decrypts a batch of drops with one key.
///
/// With [`BatchPolicy::FailFast`] the first error is returned. With
/// [`BatchPolicy::SkipAndReport`] failing drops are left out of
/// `decrypted` and listed in `failures`.
pub fn decrypt_batch(
    drops: &[EncryptedDrop],
    key: &MasterKey,
    policy: BatchPolicy,
) -> DropResult<BatchReport> {
    let mut report = BatchReport::default();
    for drop in drops {
        match decrypt_drop(drop, key) {
            Ok(record) => report.decrypted.push(record),
            Err(error) => {
                warn!("drop {} could not be decrypted: {error}", drop.id);
                if policy == BatchPolicy::FailFast {
                    return Err(error);
                }
                report.failures.push(BatchFailure {
                    drop_id: drop.id.clone(),
                    error,
                });
            }
        }
    }
    Ok(report)
}

/// Associated data bound to one sealed field.
pub(crate) fn field_aad(
    drop_id: &str,
    field: &str,
    level: PrivacyLevel,
    key_id: &KeyId,
) -> Vec<u8> {
    format!("droplit:v1:{drop_id}:{field}:{level}:{key_id}").into_bytes()
}

fn seal_field(
    drop_id: &str,
    field: &str,
    value: &Value,
    level: PrivacyLevel,
    key: &MasterKey,
) -> DropResult<SealedField> {
    let plaintext = serde_json::to_vec(value)?;
    let aad = field_aad(drop_id, field, level, key.id());
    let data = encrypt(level.cipher().suite, key.material(), &plaintext, &aad)?;
    Ok(SealedField {
        ciphertext: data.ciphertext,
        nonce: data.nonce,
        suite: data.suite,
        key_id: key.id().clone(),
        level,
    })
}

fn open_field(
    drop_id: &str,
    field: &str,
    sealed: &SealedField,
    key: &MasterKey,
) -> DropResult<Value> {
    if &sealed.key_id != key.id() {
        return Err(key_mismatch(drop_id, field, &sealed.key_id, key.id()));
    }

    let data = EncryptedData {
        suite: sealed.suite,
        nonce: sealed.nonce.clone(),
        ciphertext: sealed.ciphertext.clone(),
    };
    let aad = field_aad(drop_id, field, sealed.level, &sealed.key_id);
    let plaintext = decrypt(key.material(), &data, &aad).map_err(|_| tamper(drop_id, field))?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Rejects drops whose layout no policy could have produced: a field both
/// sealed and plain, a sealed field outside its level's scope, a sealed
/// field whose key id differs from the drop's, or a plain field the drop's
/// level should have sealed.
fn check_structure(drop: &EncryptedDrop) -> DropResult<()> {
    let scope = scope_for(drop.level);
    for (name, field) in &drop.sealed {
        let misplaced = drop.plain.contains_key(name)
            || !scope.contains(name)
            || !scope_for(field.level).contains(name)
            || drop.key_id.as_ref() != Some(&field.key_id);
        if misplaced {
            return Err(tamper(&drop.id, name));
        }
    }
    if let Some(name) = drop.plain.keys().find(|name| scope.contains(name)) {
        return Err(tamper(&drop.id, name));
    }
    Ok(())
}

fn first_foreign_field<'a>(
    drop: &'a EncryptedDrop,
    key_id: &KeyId,
) -> Option<(&'a str, &'a KeyId)> {
    drop.sealed
        .iter()
        .find(|(_, field)| &field.key_id != key_id)
        .map(|(name, field)| (name.as_str(), &field.key_id))
}

fn key_mismatch(drop_id: &str, field: &str, expected: &KeyId, actual: &KeyId) -> DropError {
    DropError::KeyMismatch {
        drop_id: drop_id.to_string(),
        field: field.to_string(),
        expected: expected.clone(),
        actual: actual.clone(),
    }
}

fn tamper(drop_id: &str, field: &str) -> DropError {
    DropError::Tamper {
        drop_id: drop_id.to_string(),
        field: field.to_string(),
    }
}
