//! Presentation hints for encryption state.
//!
//! Nothing here is cached: every call reads the key store and the drop.

use crate::policy::PrivacyLevel;
use crate::types::EncryptedDrop;
use droplit_crypto::KeyId;
use droplit_vault::KeyStore;
use serde::Serialize;

/// Badge shown next to a drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropStatus {
    pub icon: &'static str,
    pub text: String,
    pub class: &'static str,
}

impl DropStatus {
    fn new(icon: &'static str, text: impl Into<String>, class: &'static str) -> Self {
        Self {
            icon,
            text: text.into(),
            class,
        }
    }
}

/// App-wide encryption state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptionStatus {
    pub active: bool,
    #[serde(rename = "keyId")]
    pub key_id: Option<KeyId>,
    pub provenance: Option<&'static str>,
}

pub struct StatusReporter<'a> {
    store: &'a KeyStore,
}

impl<'a> StatusReporter<'a> {
    pub fn new(store: &'a KeyStore) -> Self {
        Self { store }
    }

    pub fn status_for(&self, drop: &EncryptedDrop) -> DropStatus {
        if !drop.is_sealed() {
            return DropStatus::new("unlock", "Not encrypted", "encryption-none");
        }
        let Some(active) = self.store.current_key_id() else {
            return DropStatus::new("lock", "Locked", "encryption-locked");
        };
        if drop.foreign_key_ids(&active).next().is_some() {
            return DropStatus::new("key-alert", "Key mismatch", "encryption-mismatch");
        }

        match drop.level {
            PrivacyLevel::Standard => {
                DropStatus::new("shield", "Encrypted (Standard)", "encryption-standard")
            }
            PrivacyLevel::High => {
                DropStatus::new("shield-half", "Encrypted (High)", "encryption-high")
            }
            PrivacyLevel::Maximum => {
                DropStatus::new("shield-check", "Encrypted (Maximum)", "encryption-maximum")
            }
        }
    }

    pub fn global_status(&self) -> EncryptionStatus {
        match self.store.active_key() {
            Ok(key) => EncryptionStatus {
                active: true,
                key_id: Some(key.id().clone()),
                provenance: Some(key.provenance().kind()),
            },
            Err(_) => EncryptionStatus {
                active: false,
                key_id: None,
                provenance: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::encrypt_drop;
    use crate::types::DropRecord;
    use droplit_crypto::generate_random;
    use droplit_vault::{MemoryKeyRecordStore, StaticDeviceKey};
    use std::sync::Arc;

    fn store() -> KeyStore {
        KeyStore::new(
            "alice",
            Arc::new(MemoryKeyRecordStore::new()),
            Arc::new(StaticDeviceKey::random()),
        )
    }

    fn notes_drop() -> DropRecord {
        DropRecord::with_id("d").with_field("notes", "secret")
    }

    #[test]
    fn locked_before_activation() {
        let store = store();
        let key = generate_random();
        let enc = encrypt_drop(&notes_drop(), PrivacyLevel::High, &key).unwrap();
        let reporter = StatusReporter::new(&store);

        assert_eq!(reporter.status_for(&enc).class, "encryption-locked");
        assert!(!reporter.global_status().active);
    }

    #[test]
    fn per_level_badge_with_matching_key() {
        let store = store();
        store.activate(generate_random()).unwrap();
        let key = store.active_key().unwrap();
        let reporter = StatusReporter::new(&store);

        for (level, class) in [
            (PrivacyLevel::Standard, "encryption-standard"),
            (PrivacyLevel::High, "encryption-high"),
            (PrivacyLevel::Maximum, "encryption-maximum"),
        ] {
            let enc = encrypt_drop(&notes_drop(), level, &key).unwrap();
            assert_eq!(reporter.status_for(&enc).class, class);
        }
    }

    #[test]
    fn mismatch_badge_tracks_active_key() {
        let store = store();
        store.activate(generate_random()).unwrap();
        let old = store.active_key().unwrap();
        let enc = encrypt_drop(&notes_drop(), PrivacyLevel::Standard, &old).unwrap();
        let reporter = StatusReporter::new(&store);
        assert_eq!(reporter.status_for(&enc).text, "Encrypted (Standard)");

        store.activate(generate_random()).unwrap();
        assert_eq!(reporter.status_for(&enc).class, "encryption-mismatch");
    }

    #[test]
    fn unsealed_drop_badge() {
        let store = store();
        store.activate(generate_random()).unwrap();
        let key = store.active_key().unwrap();
        let drop = DropRecord::with_id("d").with_field("category", "idea");
        let enc = encrypt_drop(&drop, PrivacyLevel::Maximum, &key).unwrap();

        assert_eq!(StatusReporter::new(&store).status_for(&enc).text, "Not encrypted");
    }

    #[test]
    fn unsealed_drop_is_not_shown_locked() {
        let store = store();
        let drop = DropRecord::with_id("d").with_field("category", "idea");
        let enc = encrypt_drop(&drop, PrivacyLevel::Standard, &generate_random()).unwrap();

        assert!(!store.is_ready());
        assert_eq!(StatusReporter::new(&store).status_for(&enc).class, "encryption-none");
    }

    #[test]
    fn global_status_mirrors_store() {
        let store = store();
        let reporter = StatusReporter::new(&store);
        let key = generate_random();
        let id = key.id().clone();
        store.activate(key).unwrap();

        let status = reporter.global_status();
        assert!(status.active);
        assert_eq!(status.key_id, Some(id));
        assert_eq!(status.provenance, Some("device_generated"));

        store.clear();
        assert_eq!(
            reporter.global_status(),
            EncryptionStatus {
                active: false,
                key_id: None,
                provenance: None
            }
        );
    }
}
