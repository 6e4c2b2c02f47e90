//! Persisted form of a master key.

use crate::error::{VaultError, VaultResult};
use chrono::{DateTime, Utc};
use droplit_crypto::{
    CipherSuite, EncryptedData, KeyId, KeyMaterial, MasterKey, Provenance, decrypt, encrypt,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// What is stored on the device for the active key of one identity.
///
/// Never contains the password, and never contains key bytes except wrapped
/// under the device key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub key_id: KeyId,
    pub provenance: Provenance,
    /// Present only for device-generated keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapped_key: Option<EncryptedData>,
    pub created_at: DateTime<Utc>,
}

impl KeyRecord {
    /// Builds the record for `key`. `wrapping_key` is required for
    /// device-generated keys and ignored otherwise.
    pub(crate) fn for_key(
        identity: &str,
        key: &MasterKey,
        wrapping_key: Option<&KeyMaterial>,
    ) -> VaultResult<Self> {
        let wrapped_key = match key.provenance() {
            Provenance::PasswordDerived { .. } => None,
            Provenance::DeviceGenerated => {
                let wrapping_key = wrapping_key.ok_or(VaultError::Unwrap)?;
                Some(encrypt(
                    CipherSuite::ChaCha20Poly1305,
                    wrapping_key,
                    key.material().as_bytes(),
                    &wrap_aad(identity, key.id()),
                )?)
            }
        };

        Ok(Self {
            key_id: key.id().clone(),
            provenance: key.provenance().clone(),
            wrapped_key,
            created_at: Utc::now(),
        })
    }

    /// Recovers a device-generated key from its wrapped form.
    pub(crate) fn unwrap_key(
        &self,
        identity: &str,
        wrapping_key: &KeyMaterial,
    ) -> VaultResult<MasterKey> {
        let wrapped = self.wrapped_key.as_ref().ok_or(VaultError::WrongProvenance {
            expected: "device_generated",
            actual: self.provenance.kind(),
        })?;

        let mut bytes = decrypt(wrapping_key, wrapped, &wrap_aad(identity, &self.key_id))
            .map_err(|_| VaultError::Unwrap)?;
        let material = KeyMaterial::from_slice(&bytes);
        bytes.zeroize();
        let material = material?;
        let key = MasterKey::new(material, Provenance::DeviceGenerated);

        if key.id() != &self.key_id {
            return Err(VaultError::Storage(format!(
                "unwrapped key {} does not match record {}",
                key.id(),
                self.key_id
            )));
        }
        Ok(key)
    }
}

fn wrap_aad(identity: &str, key_id: &KeyId) -> Vec<u8> {
    format!("droplit-key-record:v1:{identity}:{key_id}").into_bytes()
}
