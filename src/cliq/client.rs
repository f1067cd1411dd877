use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// One upstream REST call, relative to the API base URL.
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub method: Method,
    pub path: String,
}

impl EndpointSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
        }
    }
}

/// Classified outcome of a failed upstream call. Only `AuthExpired` is
/// eligible for the refresh-and-retry flow; everything else is a failure a
/// retry cannot fix.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rejected the access token")]
    AuthExpired,

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("upstream transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Perform one authenticated call and classify the outcome. Never
    /// mutates stored credentials.
    async fn call(&self, access_token: &str, endpoint: &EndpointSpec)
        -> Result<Value, UpstreamError>;
}

/// reqwest-backed client for the Cliq REST API, with a bounded timeout so a
/// hung upstream never hangs a handler.
pub struct CliqClient {
    http: reqwest::Client,
    base_url: String,
}

impl CliqClient {
    pub fn new(base_url: String, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }
}

/// Token codes the Cliq API uses for an invalid or expired bearer token.
/// These can arrive on a 400 as well as a 401.
fn body_signals_expired_token(body: &str) -> bool {
    body.contains("INVALID_OAUTHTOKEN") || body.contains("invalid_token")
}

fn classify_failure(status: StatusCode, body: String) -> UpstreamError {
    if status == StatusCode::UNAUTHORIZED || body_signals_expired_token(&body) {
        UpstreamError::AuthExpired
    } else {
        UpstreamError::Upstream {
            status: status.as_u16(),
            body: truncate_body(body),
        }
    }
}

/// Cap pass-through upstream bodies so error messages stay bounded
fn truncate_body(body: String) -> String {
    const MAX: usize = 256;
    if body.len() <= MAX {
        body
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

#[async_trait]
impl UpstreamApi for CliqClient {
    async fn call(
        &self,
        access_token: &str,
        endpoint: &EndpointSpec,
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), endpoint.path);

        let response = self
            .http
            .request(endpoint.method.clone(), &url)
            .header("Authorization", format!("Zoho-oauthtoken {}", access_token))
            .send()
            .await
            .map_err(|e| {
                // Timeouts are transport failures, never an auth signal
                if e.is_timeout() {
                    UpstreamError::Transport(format!("request to {} timed out", endpoint.path))
                } else {
                    UpstreamError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if status.is_success() {
            Ok(serde_json::from_str(&body).unwrap_or(Value::Null))
        } else {
            tracing::warn!("cliq call {} failed with status {}", endpoint.path, status);
            Err(classify_failure(status, body))
        }
    }
}
