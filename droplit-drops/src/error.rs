use droplit_crypto::{CryptoError, KeyId};

#[derive(Debug, thiserror::Error)]
pub enum DropError {
    #[error("unknown privacy level: {0:?}")]
    UnknownLevel(String),

    /// The drop was sealed under a different key than the one supplied.
    /// Recoverable by unlocking or reloading the right key.
    #[error("drop {drop_id} field {field} sealed with key {expected}, active key is {actual}")]
    KeyMismatch {
        drop_id: String,
        field: String,
        expected: KeyId,
        actual: KeyId,
    },

    /// Authentication failed: ciphertext, nonce or bound metadata was altered.
    #[error("drop {drop_id} field {field} failed authentication")]
    Tamper { drop_id: String, field: String },

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DropError {
    /// Whether supplying a different key could resolve the error.
    pub fn is_key_mismatch(&self) -> bool {
        matches!(self, DropError::KeyMismatch { .. })
    }

    pub fn is_tamper(&self) -> bool {
        matches!(self, DropError::Tamper { .. })
    }
}

pub type DropResult<T> = Result<T, DropError>;
