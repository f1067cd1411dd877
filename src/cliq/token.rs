use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::IntegrationConfig;

/// Token endpoint result. `refresh_token` is absent when the flow reuses
/// the prior one.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("token endpoint denied the refresh: {0}")]
    Denied(String),

    #[error("token endpoint transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError>;
}

/// OAuth refresh against the Zoho accounts token endpoint.
pub struct CliqTokenExchanger {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl CliqTokenExchanger {
    pub fn from_config(config: &IntegrationConfig) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }
}

#[async_trait]
impl TokenExchanger for CliqTokenExchanger {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RefreshError::Transport("token endpoint timed out".to_string())
                } else {
                    RefreshError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        // The Zoho token endpoint reports denials as {"error": "..."} on a
        // 200 as well as on 4xx statuses.
        if let Some(error) = body.get("error").and_then(Value::as_str) {
            return Err(RefreshError::Denied(error.to_string()));
        }
        if !status.is_success() {
            return Err(RefreshError::Denied(format!("status {}", status)));
        }

        serde_json::from_value(body)
            .map_err(|e| RefreshError::Denied(format!("unexpected token response: {}", e)))
    }
}
