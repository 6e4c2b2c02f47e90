//! Key derivation and authenticated encryption for Droplit.
//!
//! Provides the primitives the rest of the workspace builds on:
//! - Argon2id for deriving a master key from a password
//! - A CSPRNG for device-generated master keys
//! - ChaCha20-Poly1305 / XChaCha20-Poly1305 for authenticated encryption
//! - Zeroizing key containers that never print their contents
//!
//! # Key identity
//!
//! Every [`MasterKey`] carries a [`KeyId`] computed from the key bytes.
//! Because it is content-derived, the same password, salt and KDF parameters
//! reproduce the same `KeyId` on any device, while two different keys never
//! share one. Ciphertext is stamped with the `KeyId` so a wrong key can be
//! reported as such instead of as corrupted data.

mod cipher;
pub mod encoding;
mod error;
mod key;

pub use cipher::{CipherSuite, EncryptedData, NONCE_SIZE, TAG_SIZE, XNONCE_SIZE, decrypt, encrypt};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    KEY_SIZE, KdfAlgorithm, KdfParams, KeyId, KeyMaterial, MIN_PASSWORD_LEN, MasterKey,
    Provenance, SALT_SIZE, Salt, derive_from_password, generate_random,
};
