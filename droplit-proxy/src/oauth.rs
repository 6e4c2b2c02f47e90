//! Token-refresh proxy client.
//!
//! The proxy holds the OAuth client secret. The app sends its stored refresh
//! token and receives a short-lived access token for cloud storage.

use crate::config::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::retry::send_with_retry;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Short-lived cloud-storage access token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    pub token_type: String,
}

impl AccessToken {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Anything that can turn a refresh token into a fresh access token.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fresh_access_token(&self, refresh_token: &str) -> ProxyResult<AccessToken>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct VendorErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// HTTP client for the token-refresh proxy.
pub struct OAuthProxyClient {
    client: Client,
    config: ProxyConfig,
    caller_token: String,
}

impl OAuthProxyClient {
    /// `caller_token` is the bearer credential identifying this app to the
    /// proxy.
    pub fn new(config: ProxyConfig, caller_token: impl Into<String>) -> ProxyResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            config,
            caller_token: caller_token.into(),
        })
    }
}

#[async_trait]
impl TokenProvider for OAuthProxyClient {
    async fn fresh_access_token(&self, refresh_token: &str) -> ProxyResult<AccessToken> {
        let body = RefreshRequest { refresh_token };
        let resp = send_with_retry("token refresh", self.config.retry_delay(), || {
            self.client
                .post(&self.config.oauth_url)
                .bearer_auth(&self.caller_token)
                .json(&body)
        })
        .await?;

        let status = resp.status();
        if status.is_success() {
            let token: AccessToken = resp.json().await?;
            debug!("refreshed access token, expires in {}s", token.expires_in);
            return Ok(token);
        }

        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<VendorErrorBody>(&text) {
            Ok(vendor) => {
                warn!("token refresh rejected: {}", vendor.error);
                Err(ProxyError::Vendor {
                    code: vendor.error,
                    message: vendor.error_description.unwrap_or_default(),
                })
            }
            Err(_) => Err(ProxyError::Status {
                status: status.as_u16(),
                body: text,
            }),
        }
    }
}
