//! Authenticated encryption with ChaCha20-Poly1305 and XChaCha20-Poly1305.
//!
//! Every call to [`encrypt`] draws a fresh random nonce. Associated data is
//! authenticated but not stored; the caller must supply the same bytes to
//! [`decrypt`].

use crate::error::{CryptoError, CryptoResult};
use crate::key::KeyMaterial;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// ChaCha20-Poly1305 nonce size.
pub const NONCE_SIZE: usize = 12;

/// XChaCha20-Poly1305 nonce size.
pub const XNONCE_SIZE: usize = 24;

/// Poly1305 tag size appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

/// AEAD construction used for a ciphertext.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherSuite {
    ChaCha20Poly1305,
    XChaCha20Poly1305,
}

impl CipherSuite {
    pub fn nonce_size(self) -> usize {
        match self {
            CipherSuite::ChaCha20Poly1305 => NONCE_SIZE,
            CipherSuite::XChaCha20Poly1305 => XNONCE_SIZE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CipherSuite::ChaCha20Poly1305 => "chacha20poly1305",
            CipherSuite::XChaCha20Poly1305 => "xchacha20poly1305",
        }
    }
}

/// Ciphertext plus the nonce and suite needed to open it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub suite: CipherSuite,
    #[serde(with = "crate::encoding::base64_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext with the Poly1305 tag appended.
    #[serde(with = "crate::encoding::base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Total stored size (nonce + ciphertext + tag).
    pub fn len(&self) -> usize {
        self.nonce.len() + self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}

/// Encrypts `plaintext` under `key`, authenticating `aad` alongside it.
pub fn encrypt(
    suite: CipherSuite,
    key: &KeyMaterial,
    plaintext: &[u8],
    aad: &[u8],
) -> CryptoResult<EncryptedData> {
    let mut nonce = vec![0u8; suite.nonce_size()];
    rand::rng().fill_bytes(&mut nonce);

    let key = Key::from_slice(key.as_bytes());
    let payload = Payload {
        msg: plaintext,
        aad,
    };

    let ciphertext = match suite {
        CipherSuite::ChaCha20Poly1305 => {
            ChaCha20Poly1305::new(key).encrypt(Nonce::from_slice(&nonce), payload)
        }
        CipherSuite::XChaCha20Poly1305 => {
            XChaCha20Poly1305::new(key).encrypt(XNonce::from_slice(&nonce), payload)
        }
    }
    .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(EncryptedData {
        suite,
        nonce,
        ciphertext,
    })
}

/// Decrypts and authenticates `data`.
///
/// Fails with [`CryptoError::Decryption`] when the key is wrong or the
/// ciphertext, nonce or associated data were altered.
pub fn decrypt(key: &KeyMaterial, data: &EncryptedData, aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let expected = data.suite.nonce_size();
    if data.nonce.len() != expected {
        return Err(CryptoError::InvalidNonceLength {
            expected,
            actual: data.nonce.len(),
        });
    }

    let key = Key::from_slice(key.as_bytes());
    let payload = Payload {
        msg: data.ciphertext.as_slice(),
        aad,
    };

    match data.suite {
        CipherSuite::ChaCha20Poly1305 => {
            ChaCha20Poly1305::new(key).decrypt(Nonce::from_slice(&data.nonce), payload)
        }
        CipherSuite::XChaCha20Poly1305 => {
            XChaCha20Poly1305::new(key).decrypt(XNonce::from_slice(&data.nonce), payload)
        }
    }
    .map_err(|_| CryptoError::Decryption("wrong key or tampered data".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_both_suites() {
        let key = KeyMaterial::random();
        for suite in [CipherSuite::ChaCha20Poly1305, CipherSuite::XChaCha20Poly1305] {
            let enc = encrypt(suite, &key, b"hello drop", b"aad").unwrap();
            assert_eq!(enc.nonce.len(), suite.nonce_size());
            assert_eq!(enc.ciphertext.len(), b"hello drop".len() + TAG_SIZE);
            assert_eq!(decrypt(&key, &enc, b"aad").unwrap(), b"hello drop");
        }
    }

    #[test]
    fn fresh_nonce_every_call() {
        let key = KeyMaterial::random();
        let a = encrypt(CipherSuite::ChaCha20Poly1305, &key, b"same", b"").unwrap();
        let b = encrypt(CipherSuite::ChaCha20Poly1305, &key, b"same", b"").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn mismatched_aad_fails() {
        let key = KeyMaterial::random();
        let enc = encrypt(CipherSuite::XChaCha20Poly1305, &key, b"data", b"drop-1").unwrap();
        let err = decrypt(&key, &enc, b"drop-2").unwrap_err();
        assert!(matches!(err, CryptoError::Decryption(_)));
    }

    #[test]
    fn wrong_nonce_length_is_reported() {
        let key = KeyMaterial::random();
        let mut enc = encrypt(CipherSuite::ChaCha20Poly1305, &key, b"data", b"").unwrap();
        enc.nonce.push(0);
        let err = decrypt(&key, &enc, b"").unwrap_err();
        assert!(matches!(
            err,
            CryptoError::InvalidNonceLength {
                expected: 12,
                actual: 13
            }
        ));
    }

    #[test]
    fn serializes_with_base64_fields() {
        let key = KeyMaterial::random();
        let enc = encrypt(CipherSuite::ChaCha20Poly1305, &key, b"data", b"").unwrap();
        let json = serde_json::to_value(&enc).unwrap();
        assert_eq!(json["suite"], "chacha20poly1305");
        assert!(json["nonce"].is_string());
        assert!(json["ciphertext"].is_string());
        let back: EncryptedData = serde_json::from_value(json).unwrap();
        assert_eq!(back, enc);
    }
}
