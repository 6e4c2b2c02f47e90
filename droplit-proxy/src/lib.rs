//! Clients for the external services around the Droplit core.
//!
//! - [`OAuthProxyClient`] exchanges a stored refresh token for a short-lived
//!   cloud-storage access token.
//! - [`AiProxyClient`] sends an image to the hosted vision model for OCR or a
//!   description.
//!
//! Both are reached through traits ([`TokenProvider`], [`ImageAnalyzer`]) so
//! callers can substitute fakes. Every request has a timeout and is retried
//! once on transport failures, timeouts and 5xx responses.

pub mod analysis;
pub mod config;
pub mod error;
pub mod oauth;
mod retry;

pub use analysis::{AiProxyClient, AnalysisAction, AnalysisResult, ImageAnalyzer, ImageInput, Usage};
pub use config::ProxyConfig;
pub use error::{ProxyError, ProxyResult};
pub use oauth::{AccessToken, OAuthProxyClient, TokenProvider};
