//! Upstream cinema API access.
//!
//! The catalog talks to the upstream through [`Upstream`] so tests can
//! swap the HTTP client for an in-memory double.

use std::time::Duration;

use async_trait::async_trait;
use marquee_core::OriginError;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// JSON access to the upstream API.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    /// GET `path` and decode the JSON body.
    async fn get_json(&self, path: &str) -> Result<Value, OriginError>;

    /// POST `body` to `path` and decode the JSON response.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, OriginError>;
}

/// reqwest-backed upstream.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("marquee/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::internal_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_transport(&self, err: reqwest::Error) -> OriginError {
        if err.is_timeout() {
            OriginError::Timeout {
                elapsed: self.timeout,
            }
        } else if err.is_connect() || err.is_request() {
            OriginError::Unavailable {
                reason: err.to_string(),
            }
        } else if err.is_decode() {
            OriginError::InvalidPayload {
                reason: err.to_string(),
            }
        } else {
            OriginError::other(err.to_string())
        }
    }

    async fn decode(&self, response: reqwest::Response) -> Result<Value, OriginError> {
        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("Unexpected status")
                    .to_string(),
            });
        }
        response.json::<Value>().await.map_err(|e| self.map_transport(e))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn get_json(&self, path: &str) -> Result<Value, OriginError> {
        let started = std::time::Instant::now();
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        tracing::debug!(
            path,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream GET"
        );
        self.decode(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, OriginError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        tracing::debug!(path, status = response.status().as_u16(), "Upstream POST");
        self.decode(response).await
    }
}
