// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// API error taxonomy with a stable machine-readable kind per variant.
///
/// Business-level failures (unknown action, missing field, not found, broken
/// integration, upstream trouble) are reported inside a 200 envelope with
/// `success: false`; only malformed input (400), missing tenant identity
/// (401) and unexpected internal faults (500) change the HTTP status.
#[derive(Debug)]
pub enum ApiError {
    /// No verified tenant identity could be established for the request.
    NoTenantIdentity(String),

    /// Bad JSON body, or a missing/non-string `action` field.
    MalformedInput(String),

    /// `(resource, action)` pair not present in the dispatch registry.
    UnknownAction { resource: String, action: String },

    /// A required input field is absent; reported before any side effect.
    MissingField { name: &'static str },

    /// Resource absent, or owned by another tenant - indistinguishable on
    /// purpose so callers cannot probe for other tenants' data.
    NotFound(String),

    /// No integration credential stored for this tenant.
    NotConfigured(String),

    /// Stored credential has no refresh token; the tenant must re-run setup.
    NoRefreshToken,

    /// The token endpoint rejected the refresh; the tenant must re-run setup.
    RefreshDenied(String),

    /// Third-party failure that a refresh cannot fix (sanitized message).
    Upstream(String),

    /// Unexpected internal fault; details go to the logs, not the client.
    Internal(String),
}

impl ApiError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NoTenantIdentity(_) => StatusCode::UNAUTHORIZED,
            ApiError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            // Business-level failures ride in the envelope; the flag is
            // authoritative, not the status.
            _ => StatusCode::OK,
        }
    }

    /// Stable error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NoTenantIdentity(_) => "NO_TENANT_IDENTITY",
            ApiError::MalformedInput(_) => "MALFORMED_INPUT",
            ApiError::UnknownAction { .. } => "UNKNOWN_ACTION",
            ApiError::MissingField { .. } => "MISSING_FIELD",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::NotConfigured(_) => "NOT_CONFIGURED",
            ApiError::NoRefreshToken => "NO_REFRESH_TOKEN",
            ApiError::RefreshDenied(_) => "REFRESH_DENIED",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Client-safe human-readable message
    pub fn message(&self) -> String {
        match self {
            ApiError::NoTenantIdentity(msg) => msg.clone(),
            ApiError::MalformedInput(msg) => msg.clone(),
            ApiError::UnknownAction { resource, action } => {
                format!("Unknown action '{}' for resource '{}'", action, resource)
            }
            ApiError::MissingField { name } => {
                format!("Missing required field '{}'", name)
            }
            ApiError::NotFound(what) => format!("{} not found", what),
            ApiError::NotConfigured(integration) => {
                format!("Integration '{}' is not configured", integration)
            }
            ApiError::NoRefreshToken => {
                "Integration has no refresh token; please run setup again".to_string()
            }
            ApiError::RefreshDenied(msg) => {
                format!("Token refresh was denied: {}; please run setup again", msg)
            }
            ApiError::Upstream(msg) => format!("Upstream service error: {}", msg),
            ApiError::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    /// Response envelope body
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "message": self.message(),
            "error": self.error_code(),
        })
    }
}

// Map datastore failures to a generic internal fault; the real error is
// logged, never returned to the client.
impl From<crate::store::StoreError> for ApiError {
    fn from(err: crate::store::StoreError) -> Self {
        tracing::error!("datastore error: {}", err);
        ApiError::Internal(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

/// Success envelope helper used by every handler
pub fn success_envelope(message: &str, data: Value) -> Value {
    json!({
        "success": true,
        "message": message,
        "data": data,
    })
}
