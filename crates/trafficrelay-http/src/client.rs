//! HTTP worker instance backed by `reqwest`.
//!
//! Each slice is one `POST {base}/upload` with a JSON body. Only the status
//! class of the response is used; the body is discarded.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Url;

use trafficrelay_core::error::TransportError;
use trafficrelay_core::instance::{DeliveryStatus, WorkerInstance};

/// Path every instance accepts slice uploads on.
pub const UPLOAD_PATH: &str = "/upload";

/// Configuration for `HttpWorkerInstance`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Build a `reqwest` client with the configured timeout.
pub fn build_client(config: &HttpClientConfig) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))
}

/// Resolve the upload URL for an instance base URL.
pub fn upload_url(base_url: &str) -> Result<Url, TransportError> {
    let joined = format!("{}{UPLOAD_PATH}", base_url.trim_end_matches('/'));
    Url::parse(&joined).map_err(|e| TransportError::InvalidEndpoint {
        endpoint: base_url.to_string(),
        reason: e.to_string(),
    })
}

/// One worker instance reachable over HTTP.
pub struct HttpWorkerInstance {
    name: String,
    url: Url,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpWorkerInstance {
    /// Create an instance with its own client.
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        config: HttpClientConfig,
    ) -> Result<Self, TransportError> {
        let http = build_client(&config)?;
        Self::with_client(name, base_url, http, config.request_timeout)
    }

    /// Create an instance sharing an existing client (and its connection pool).
    pub fn with_client(
        name: impl Into<String>,
        base_url: &str,
        http: reqwest::Client,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            name: name.into(),
            url: upload_url(base_url)?,
            http,
            request_timeout,
        })
    }

    /// Full upload URL.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl WorkerInstance for HttpWorkerInstance {
    async fn deliver(&self, payload: Bytes) -> Result<DeliveryStatus, TransportError> {
        let size = payload.len();
        let resp = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        let status = DeliveryStatus(resp.status().as_u16());
        tracing::debug!(
            instance = %self.name,
            url = %self.url,
            bytes = size,
            %status,
            "slice delivered"
        );
        Ok(status)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
