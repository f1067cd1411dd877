use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
    Extension,
};
use serde_json::Value;

use crate::dispatch::{dispatch, ActionRequest};
use crate::error::{success_envelope, ApiError};
use crate::middleware::TenantContext;
use crate::state::AppState;

/// POST /api/:resource - the action envelope endpoint.
///
/// Body: `{"action": string, ...operation fields}`. Tenant identity comes
/// from the resolution middleware, never from the body (admins excepted,
/// see the dispatcher).
pub async fn action_post(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Extension(ctx): Extension<TenantContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(value) = body.map_err(|e| ApiError::MalformedInput(format!("Invalid JSON body: {}", e)))?;

    let Value::Object(fields) = value else {
        return Err(ApiError::MalformedInput(
            "Request body must be a JSON object".into(),
        ));
    };

    let action = fields
        .get("action")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::MalformedInput("Missing 'action' field".into()))?
        .to_string();

    let data = dispatch(
        &state,
        &ctx,
        &resource,
        ActionRequest {
            action,
            body: fields,
        },
    )
    .await?;

    Ok(Json(success_envelope("ok", data)))
}
