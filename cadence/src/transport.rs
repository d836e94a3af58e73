//! HTTP delivery-provider client.
//!
//! A thin Resend-style client: `POST {base_url}/emails` with a bearer key,
//! JSON in, `{"id": …}` out. The client is constructed once by the process
//! entry point and injected into the engine; provider responses are mapped
//! onto the engine's transient/permanent error taxonomy so the retry policy
//! can do its job.

use std::time::Duration;

use async_trait::async_trait;
use cadence_dispatch::{MailOutline, Transport, TransportError};
use reqwest::StatusCode;
use serde::Deserialize;

fn default_base_url() -> String {
    "https://api.resend.com".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

/// Provider client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// Provider API key.
    pub api_key: String,

    /// Provider API base URL.
    ///
    /// Default: `https://api.resend.com`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    ///
    /// Default: 30
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// The provider's success payload.
#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
}

/// Resend-style HTTP transport.
#[derive(Debug)]
pub struct ResendTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl ResendTransport {
    /// Build the HTTP client.
    ///
    /// # Errors
    /// Returns an error if the underlying client cannot be constructed.
    pub fn new(config: TransportConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }
}

/// Map a non-success provider status onto the engine's error taxonomy.
fn classify_status(status: StatusCode, detail: String) -> TransportError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited(detail),
        StatusCode::REQUEST_TIMEOUT => TransportError::Timeout(detail),
        status if status.is_server_error() => TransportError::Unavailable(detail),
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
            TransportError::InvalidRequest(detail)
        }
        _ => TransportError::Rejected(detail),
    }
}

#[async_trait]
impl Transport for ResendTransport {
    async fn send(&self, outline: &MailOutline) -> Result<String, TransportError> {
        let url = format!("{}/emails", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&serde_json::json!({
                "from": outline.from,
                "to": outline.to,
                "subject": outline.subject,
                "html": outline.html,
            }))
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    TransportError::Timeout(error.to_string())
                } else {
                    TransportError::Unavailable(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(classify_status(status, detail));
        }

        let body: SendResponse = response
            .json()
            .await
            .map_err(|error| TransportError::InvalidRequest(error.to_string()))?;
        body.id.ok_or_else(|| {
            TransportError::InvalidRequest("provider response carried no message id".to_string())
        })
    }
}
