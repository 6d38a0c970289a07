//! HTTP client shared by every outbound remote cluster call.
//!
//! Provides a wrapper around reqwest with:
//! - Connection reuse (capped idle pool, long keep-alive)
//! - An overall request timeout equal to the send timeout
//! - Proxy settings from the environment
//! - Frame posting with remote cluster auth headers and response decoding

use crate::config::{RemoteClusterConfig, TransportConfig};
use crate::models::{RemoteCluster, RemoteClusterFrame, Response};
use crate::{RemoteClusterError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Pooled HTTP client for send, ping and invite-confirmation calls.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct RemoteClusterClient {
    client: Client,
    /// Default timeout for requests.
    default_timeout: Duration,
}

impl RemoteClusterClient {
    /// Create a client with the protocol's send timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(RemoteClusterConfig::SEND_TIMEOUT)
    }

    /// Create a client with a custom default timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(TransportConfig::CONNECT_TIMEOUT)
            .tcp_keepalive(TransportConfig::TCP_KEEPALIVE)
            .pool_idle_timeout(TransportConfig::POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(TransportConfig::MAX_IDLE_CONNS_PER_HOST)
            .user_agent(TransportConfig::USER_AGENT)
            .build()
            .map_err(|e| RemoteClusterError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// The timeout applied when a call does not pass its own.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// POST `frame` to `path` on `rc` and decode the peer's [`Response`].
    ///
    /// Errors:
    /// - [`RemoteClusterError::Timeout`] when `timeout` elapses, whichever
    ///   stage the request was in
    /// - [`RemoteClusterError::HttpStatus`] for non-2xx replies
    /// - [`RemoteClusterError::Network`] for connection failures
    /// - [`RemoteClusterError::Json`] when the body is not a JSON object
    ///
    /// A decoded failure response is returned as `Ok`; interpreting it is up
    /// to the caller.
    pub async fn send_frame(
        &self,
        rc: &RemoteCluster,
        path: &str,
        frame: &RemoteClusterFrame,
        timeout: Duration,
    ) -> Result<Response> {
        let url = endpoint_url(&rc.site_url, path)?;

        match tokio::time::timeout(timeout, self.post_frame(url, rc, frame, timeout)).await {
            Ok(result) => result.map_err(|e| match e {
                RemoteClusterError::Timeout(_) => RemoteClusterError::Timeout(timeout),
                other => other,
            }),
            Err(_) => Err(RemoteClusterError::Timeout(timeout)),
        }
    }

    async fn post_frame(
        &self,
        url: Url,
        rc: &RemoteCluster,
        frame: &RemoteClusterFrame,
        timeout: Duration,
    ) -> Result<Response> {
        let url_str = url.to_string();

        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .header(RemoteClusterConfig::HEADER_REMOTE_ID, frame.remote_id.as_str())
            .header(RemoteClusterConfig::HEADER_REMOTE_TOKEN, rc.remote_token.as_str())
            .json(frame)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RemoteClusterError::Timeout(timeout)
                } else {
                    RemoteClusterError::Network {
                        message: format!("POST {} failed: {}", url_str, e),
                        cause: std::error::Error::source(&e).map(|s| s.to_string()),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!("POST {} returned {}", url_str, status);
            return Err(RemoteClusterError::HttpStatus {
                url: url_str,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let decoded: Response = serde_json::from_slice(&body)?;
        Ok(decoded)
    }
}

/// Join a relative endpoint path onto a peer's site URL.
///
/// The site URL may or may not end with a slash; any path it carries is
/// kept (`https://host/chat` + `api/v4/x` = `https://host/chat/api/v4/x`).
pub fn endpoint_url(site_url: &str, path: &str) -> Result<Url> {
    let trimmed = site_url.trim();
    let base = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let base = Url::parse(&base).map_err(|e| RemoteClusterError::InvalidUrl {
        url: site_url.to_string(),
        message: e.to_string(),
    })?;

    if !matches!(base.scheme(), "http" | "https") {
        return Err(RemoteClusterError::InvalidUrl {
            url: site_url.to_string(),
            message: format!("unsupported scheme {}", base.scheme()),
        });
    }

    base.join(path.trim_start_matches('/'))
        .map_err(|e| RemoteClusterError::InvalidUrl {
            url: site_url.to_string(),
            message: e.to_string(),
        })
}
