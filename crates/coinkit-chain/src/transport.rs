//! Transport abstraction for ledger requests.
//!
//! A transport delivers one serialized envelope to one URL and returns the
//! raw response body. Endpoint selection, retries and envelope handling live
//! in the client; a transport only knows about a single round trip.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{ClientError, TransportError};

/// Transport trait for posting serialized messages.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Post `body` to `url` and return the response body.
    ///
    /// Any failure, including a non-success status, is a [`TransportError`]
    /// and is eligible for retry.
    async fn post(&self, url: &Url, body: String) -> Result<String, TransportError>;
}

/// HTTP transport backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Create a transport with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport {
                attempts: 0,
                message: e.to_string(),
            })?;
        Ok(Self::with_http_client(http))
    }

    /// Use an existing reqwest client.
    pub fn with_http_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &Url, body: String) -> Result<String, TransportError> {
        let response = self
            .http
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::new(format!("HTTP {status}: {text}")));
        }

        response
            .text()
            .await
            .map_err(|e| TransportError::new(e.to_string()))
    }
}
