//! Base64 serde adapters for binary fields.
//!
//! Ciphertext, nonces and salts travel inside JSON documents (key records,
//! encrypted drops), so they are written as standard base64 strings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// `#[serde(with = "droplit_crypto::encoding::base64_bytes")]` for `Vec<u8>` fields.
pub mod base64_bytes {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Encodes bytes as standard base64.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard base64, returning `None` on malformed input.
pub fn from_base64(encoded: &str) -> Option<Vec<u8>> {
    STANDARD.decode(encoded.as_bytes()).ok()
}
