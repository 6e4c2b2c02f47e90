//! Proxy client error types.

use thiserror::Error;

/// Result type for proxy calls.
pub type ProxyResult<T> = Result<T, ProxyError>;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("proxy returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Error reported by the upstream OAuth vendor, e.g. `invalid_grant`.
    #[error("vendor error {code}: {message}")]
    Vendor { code: String, message: String },

    #[error("image analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ProxyError {
    /// Whether a second attempt might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProxyError::Timeout => true,
            ProxyError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ProxyError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
