use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiError;
use crate::store::credentials::CredentialStore;

use super::client::{EndpointSpec, UpstreamApi, UpstreamError};
use super::token::{RefreshError, TokenExchanger};

/// Perform one upstream call with at most one corrective refresh.
///
/// Attempt -> AuthExpired -> refresh -> rotate -> retry once. The outcome of
/// the retry is final; per inbound request this makes at most 2 upstream
/// calls and 1 token exchange, and a possibly-revoked integration is never
/// hammered in a loop.
pub async fn call_with_refresh(
    upstream: &dyn UpstreamApi,
    exchanger: &dyn TokenExchanger,
    credentials: &dyn CredentialStore,
    tenant_id: Uuid,
    integration: &str,
    endpoint: &EndpointSpec,
) -> Result<Value, ApiError> {
    let credential = credentials
        .get(tenant_id, integration)
        .await?
        .ok_or_else(|| ApiError::NotConfigured(integration.to_string()))?;

    match upstream.call(&credential.access_token, endpoint).await {
        Ok(payload) => return Ok(payload),
        Err(UpstreamError::AuthExpired) => {}
        Err(err) => return Err(upstream_to_api(err)),
    }

    // Stale access token. Without a refresh token there is nothing to
    // retry with; the tenant has to re-run setup.
    let refresh_token = credential
        .refresh_token
        .as_deref()
        .ok_or(ApiError::NoRefreshToken)?;

    let token = match exchanger.refresh(refresh_token).await {
        Ok(token) => token,
        Err(RefreshError::Denied(msg)) => return Err(ApiError::RefreshDenied(msg)),
        Err(RefreshError::Transport(msg)) => return Err(ApiError::RefreshDenied(msg)),
    };

    credentials
        .rotate(
            tenant_id,
            integration,
            &token.access_token,
            token.refresh_token.as_deref(),
        )
        .await?;

    match upstream.call(&token.access_token, endpoint).await {
        Ok(payload) => Ok(payload),
        // A rejection of the freshly-rotated token is final; never loop
        // back into another refresh.
        Err(UpstreamError::AuthExpired) => {
            Err(ApiError::Upstream("refreshed token was rejected".to_string()))
        }
        Err(err) => Err(upstream_to_api(err)),
    }
}

fn upstream_to_api(err: UpstreamError) -> ApiError {
    match err {
        UpstreamError::AuthExpired => ApiError::Upstream("access token rejected".to_string()),
        UpstreamError::Upstream { status, body } => {
            ApiError::Upstream(format!("status {}: {}", status, body))
        }
        UpstreamError::Transport(msg) => ApiError::Upstream(msg),
    }
}
