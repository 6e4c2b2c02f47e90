//! Drop records in plaintext and encrypted form.

use crate::policy::PrivacyLevel;
use droplit_crypto::{CipherSuite, KeyId, encoding::base64_bytes};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A user-created note/photo record with arbitrary JSON fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropRecord {
    pub id: String,
    pub fields: BTreeMap<String, Value>,
}

impl DropRecord {
    /// New drop with a time-ordered id.
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::now_v7().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }
}

impl Default for DropRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// One sealed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedField {
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    pub suite: CipherSuite,
    #[serde(rename = "keyId")]
    pub key_id: KeyId,
    pub level: PrivacyLevel,
}

/// A drop whose in-scope fields are sealed. Out-of-scope fields stay in
/// `plain`. Never mutated in place: edits and level changes produce a new
/// value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedDrop {
    pub id: String,
    pub level: PrivacyLevel,
    /// Key that sealed the drop. `None` when nothing is sealed.
    #[serde(rename = "keyId")]
    pub key_id: Option<KeyId>,
    pub plain: BTreeMap<String, Value>,
    pub sealed: BTreeMap<String, SealedField>,
}

impl EncryptedDrop {
    pub fn is_sealed(&self) -> bool {
        !self.sealed.is_empty()
    }

    /// Key ids recorded on sealed fields that differ from `key_id`.
    pub fn foreign_key_ids<'a>(&'a self, key_id: &'a KeyId) -> impl Iterator<Item = &'a KeyId> {
        self.sealed
            .values()
            .map(|field| &field.key_id)
            .filter(move |id| *id != key_id)
    }
}
