use droplit_crypto::CryptoError;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("password too short (min {0} characters)")]
    WeakPassword(usize),
    #[error("key derivation failed: {0}")]
    Derivation(String),
    #[error("invalid password")]
    InvalidPassword,
    #[error("key store is not ready")]
    NotReady,
    #[error("no key record for {0}")]
    RecordNotFound(String),
    #[error("key record is {actual}, expected {expected}")]
    WrongProvenance {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("stored key could not be unwrapped with this device's key")]
    Unwrap,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("crypto error: {0}")]
    Crypto(String),
}

pub type VaultResult<T> = Result<T, VaultError>;

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::WeakPassword { min } => VaultError::WeakPassword(min),
            CryptoError::KeyDerivation(msg) => VaultError::Derivation(msg),
            other => VaultError::Crypto(other.to_string()),
        }
    }
}

impl From<duckdb::Error> for VaultError {
    fn from(err: duckdb::Error) -> Self {
        VaultError::Storage(err.to_string())
    }
}
