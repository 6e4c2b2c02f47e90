use droplit_drops::DropError;
use droplit_proxy::ProxyError;
use droplit_vault::VaultError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Drop(#[from] DropError),

    #[error(transparent)]
    Proxy(#[from] ProxyError),

    /// A key is already set up for this identity. `forget_key` must be
    /// called before a different key can replace it.
    #[error("encryption is already set up for {0}")]
    AlreadySetUp(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        CoreError::Task(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
