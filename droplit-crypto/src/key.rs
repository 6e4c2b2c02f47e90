//! Master key derivation and generation.
//!
//! A master key either comes from a password (Argon2id, reproducible from the
//! same password + salt + parameters) or from the CSPRNG (irreproducible; lost
//! for good if local storage is wiped).

use crate::encoding::{from_base64, to_base64};
use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of a master key in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of a KDF salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Minimum password length, counted in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

const KEY_ID_DOMAIN: &[u8] = b"droplit-key-id-v1";
const KEY_ID_BYTES: usize = 16;

/// Raw symmetric key bytes, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial([u8; KEY_SIZE]);

impl KeyMaterial {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Builds key material from a slice, rejecting anything but 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_SIZE];
        arr.copy_from_slice(bytes);
        let material = Self(arr);
        arr.zeroize();
        Ok(material)
    }

    /// Fresh key material from the thread-local CSPRNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        let material = Self(bytes);
        bytes.zeroize();
        material
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

/// Random salt for password-based derivation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        let mut bytes = [0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", hex::encode(self.0))
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_base64(&self.0))
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        let bytes = from_base64(&encoded)
            .ok_or_else(|| serde::de::Error::custom("salt is not valid base64"))?;
        let arr: [u8; SALT_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            serde::de::Error::custom(format!(
                "salt must be {SALT_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }
}

/// Password hashing algorithm recorded alongside derivation parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KdfAlgorithm {
    Argon2id,
}

/// Key derivation parameters. Stored with password-derived key records so the
/// key can be reproduced exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: KdfAlgorithm,
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, single lane.
    fn default() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never chosen automatically.
    pub fn light() -> Self {
        Self {
            algorithm: KdfAlgorithm::Argon2id,
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Stable identifier of a master key, derived from its contents.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Truncated, domain-separated SHA-256 of the key bytes.
    pub fn for_material(material: &KeyMaterial) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(KEY_ID_DOMAIN);
        hasher.update(material.as_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..KEY_ID_BYTES]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.0)
    }
}

/// Where a master key came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Reproducible from the password with these parameters.
    PasswordDerived { salt: Salt, params: KdfParams },
    /// Random; exists only in local storage.
    DeviceGenerated,
}

impl Provenance {
    pub fn kind(&self) -> &'static str {
        match self {
            Provenance::PasswordDerived { .. } => "password_derived",
            Provenance::DeviceGenerated => "device_generated",
        }
    }
}

/// An immutable master key with its identity and provenance.
///
/// Rotation builds a new `MasterKey`; an existing one is never modified, so
/// shared references stay valid for in-flight encryptions.
#[derive(Clone)]
pub struct MasterKey {
    material: KeyMaterial,
    id: KeyId,
    provenance: Provenance,
}

impl MasterKey {
    pub fn new(material: KeyMaterial, provenance: Provenance) -> Self {
        let id = KeyId::for_material(&material);
        Self {
            material,
            id,
            provenance,
        }
    }

    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("id", &self.id)
            .field("provenance", &self.provenance.kind())
            .field("material", &"[REDACTED]")
            .finish()
    }
}

/// Derives a master key from a password with Argon2id.
///
/// A fresh random salt is drawn when `salt` is `None`; pass the salt from an
/// existing key record to reproduce that key. Deterministic for a given
/// `(password, salt, params)`.
pub fn derive_from_password(
    password: &str,
    salt: Option<&Salt>,
    params: &KdfParams,
) -> CryptoResult<MasterKey> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CryptoError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }

    let salt = salt.copied().unwrap_or_else(Salt::random);
    let material = derive_material(password, &salt, params)?;

    Ok(MasterKey::new(
        material,
        Provenance::PasswordDerived {
            salt,
            params: params.clone(),
        },
    ))
}

/// Generates a random, irrecoverable master key.
pub fn generate_random() -> MasterKey {
    MasterKey::new(KeyMaterial::random(), Provenance::DeviceGenerated)
}

fn derive_material(password: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<KeyMaterial> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("invalid argon2 parameters: {e}")))?;

    let algorithm = match params.algorithm {
        KdfAlgorithm::Argon2id => Algorithm::Argon2id,
    };
    let argon2 = Argon2::new(algorithm, Version::V0x13, argon_params);

    let mut out = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), salt.as_bytes(), &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let material = KeyMaterial::from_bytes(out);
    out.zeroize();
    Ok(material)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_key() {
        let salt = Salt::random();
        let a = derive_from_password("correcthorse", Some(&salt), &KdfParams::light()).unwrap();
        let b = derive_from_password("correcthorse", Some(&salt), &KdfParams::light()).unwrap();
        assert_eq!(a.material().as_bytes(), b.material().as_bytes());
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn fresh_salt_when_none_given() {
        let a = derive_from_password("correcthorse", None, &KdfParams::light()).unwrap();
        let b = derive_from_password("correcthorse", None, &KdfParams::light()).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn short_password_rejected() {
        let err = derive_from_password("short", None, &KdfParams::light()).unwrap_err();
        assert!(matches!(err, CryptoError::WeakPassword { min: 8 }));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        // 7 characters, 14 bytes
        let err = derive_from_password("ééééééé", None, &KdfParams::light()).unwrap_err();
        assert!(matches!(err, CryptoError::WeakPassword { .. }));
        assert!(derive_from_password("éééééééé", None, &KdfParams::light()).is_ok());
    }

    #[test]
    fn invalid_params_are_an_error_not_a_fallback() {
        let params = KdfParams {
            memory_kib: 1,
            ..KdfParams::light()
        };
        let err = derive_from_password("correcthorse", None, &params).unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }

    #[test]
    fn key_id_is_32_hex_chars() {
        let key = generate_random();
        assert_eq!(key.id().as_str().len(), 32);
        assert!(key.id().as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = KeyMaterial::from_bytes([0xAB; KEY_SIZE]);
        let printed = format!("{key:?}");
        assert!(!printed.to_lowercase().contains("ab, "));
        assert!(printed.contains("REDACTED"));
        let master = MasterKey::new(key, Provenance::DeviceGenerated);
        assert!(format!("{master:?}").contains("REDACTED"));
    }

    #[test]
    fn salt_serializes_as_base64() {
        let salt = Salt::from_bytes([7u8; SALT_SIZE]);
        let json = serde_json::to_string(&salt).unwrap();
        let back: Salt = serde_json::from_str(&json).unwrap();
        assert_eq!(salt, back);
        assert!(serde_json::from_str::<Salt>("\"AAAA\"").is_err());
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(KeyMaterial::from_slice(&[0u8; 31]).is_err());
        assert!(KeyMaterial::from_slice(&[0u8; 32]).is_ok());
    }
}
