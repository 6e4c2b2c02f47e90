//! Proxy client configuration.

use crate::error::{ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Endpoints and request policy for the external proxies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Token-refresh endpoint (POST `{refresh_token}`).
    pub oauth_url: String,

    /// Image-analysis endpoint (POST `{action, image, mediaType, prompt?}`).
    pub analysis_url: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Pause before the single retry, in milliseconds.
    pub retry_delay_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            oauth_url: "https://proxy.droplit.app/oauth/refresh".to_string(),
            analysis_url: "https://proxy.droplit.app/ai/analyze".to_string(),
            timeout_secs: 30,
            retry_delay_ms: 500,
        }
    }
}

impl ProxyConfig {
    /// Reads a JSON config file. Missing keys take their defaults.
    pub fn from_json_file(path: &Path) -> ProxyResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ProxyError::Config(format!("{}: {e}", path.display())))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub(crate) fn http_client(&self) -> ProxyResult<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .build()
            .map_err(|e| ProxyError::Config(format!("failed to build HTTP client: {e}")))
    }
}
