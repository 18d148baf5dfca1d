use reqwest::{Client, ClientBuilder};
use std::{sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::errors::ProbeError;

/// Maximum number of body bytes kept in an HTTP error.
const MAX_ERROR_BODY_LEN: usize = 256;

/// Configuration for HTTP client concurrency and timeout behavior.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Maximum number of concurrent probe requests across all backends
    pub concurrent_limit: usize,
    /// Permit acquisition timeout in milliseconds
    pub permit_timeout_ms: u64,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { concurrent_limit: 256, permit_timeout_ms: 500, connect_timeout_ms: 2_000 }
    }
}

/// HTTP client shared by every backend transport.
///
/// Caps the number of in-flight probes with a semaphore so a large backend pool cannot
/// exhaust sockets during a round. Requests are never retried here: a failed request is a
/// failed probe and the next round is the retry.
pub struct HttpClient {
    client: Client,
    concurrent_limit: Arc<Semaphore>,
    config: HttpClientConfig,
}

/// Keeps the semaphore permit alive for the duration of one request.
struct PermitGuard {
    _permit: OwnedSemaphorePermit,
}

impl HttpClient {
    /// Creates a new HTTP client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Creates a new HTTP client with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn with_config(config: HttpClientConfig) -> Result<Self, ProbeError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(16)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                ProbeError::Transport(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self { client, concurrent_limit: Arc::new(Semaphore::new(config.concurrent_limit)), config })
    }

    /// Maps reqwest errors to a short, credential-free description.
    ///
    /// Backend URLs frequently carry API keys, so the raw error text is never surfaced.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else {
            "network error".to_string()
        }
    }

    /// Sends one JSON POST request.
    ///
    /// # Errors
    ///
    /// - [`ProbeError::Timeout`] if permit acquisition or the request times out
    /// - [`ProbeError::Http`] for non-success HTTP status codes
    /// - [`ProbeError::Transport`] for connection and body failures
    pub async fn post(
        &self,
        url: &str,
        body: bytes::Bytes,
        timeout: Duration,
    ) -> Result<bytes::Bytes, ProbeError> {
        let permit = tokio::time::timeout(
            Duration::from_millis(self.config.permit_timeout_ms),
            Arc::clone(&self.concurrent_limit).acquire_owned(),
        )
        .await
        .map_err(|_| {
            tracing::warn!(
                available_permits = self.concurrent_limit.available_permits(),
                "http client semaphore acquisition timeout"
            );
            ProbeError::Timeout
        })?
        .map_err(|_| ProbeError::Transport("http client closed".to_string()))?;
        let _guard = PermitGuard { _permit: permit };

        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout
                } else {
                    ProbeError::Transport(Self::sanitize_network_error(&e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY_LEN {
                let mut cut = MAX_ERROR_BODY_LEN;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
                text.push_str("... (truncated)");
            }
            return Err(ProbeError::Http(status.as_u16(), text));
        }

        response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout
            } else {
                ProbeError::Transport(Self::sanitize_network_error(&e))
            }
        })
    }

    /// Returns the number of request permits currently available.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.concurrent_limit.available_permits()
    }
}
