//! Single-retry request helper.

use crate::error::{ProxyError, ProxyResult};
use reqwest::{RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Sends the request built by `build`, retrying once after `delay` when the
/// first attempt fails in transport, times out, or returns a 5xx status.
///
/// A 5xx on the second attempt is returned as a response for the caller to
/// interpret.
pub(crate) async fn send_with_retry(
    label: &str,
    delay: Duration,
    build: impl Fn() -> RequestBuilder,
) -> ProxyResult<Response> {
    match build().send().await {
        Ok(resp) if !resp.status().is_server_error() => return Ok(resp),
        Ok(resp) => warn!("{label}: server returned {}, retrying once", resp.status()),
        Err(e) if is_retryable(&e) => warn!("{label}: {e}, retrying once"),
        Err(e) => return Err(classify(e)),
    }

    tokio::time::sleep(delay).await;
    debug!("{label}: second attempt");
    build().send().await.map_err(classify)
}

fn is_retryable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}

fn classify(err: reqwest::Error) -> ProxyError {
    if err.is_timeout() {
        ProxyError::Timeout
    } else {
        ProxyError::Http(err)
    }
}
