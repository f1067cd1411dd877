use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    Extension,
};
use serde_json::{json, Value};

use crate::auth::{generate_jwt, Claims};
use crate::error::{success_envelope, ApiError};
use crate::middleware::TenantContext;
use crate::state::AppState;
use crate::store::tenants::{hash_secret, TenantRole};

/// POST /auth/login - authenticate a tenant and issue a JWT.
///
/// An unknown display name is registered on first successful authentication;
/// the very first tenant in the system gets the admin role. Known names must
/// present the same secret, and deactivated tenants are refused.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(value) = body.map_err(|e| ApiError::MalformedInput(format!("Invalid JSON body: {}", e)))?;

    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::MalformedInput("Missing 'name' field".into()))?;
    let secret = value
        .get("secret")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::MalformedInput("Missing 'secret' field".into()))?;

    let secret_hash = hash_secret(secret);

    let tenant = match state.tenants.find_by_name(name).await? {
        Some(tenant) => {
            if !tenant.active {
                return Err(ApiError::NoTenantIdentity("Tenant is deactivated".into()));
            }
            if tenant.secret_hash != secret_hash {
                return Err(ApiError::NoTenantIdentity("Invalid credentials".into()));
            }
            tenant
        }
        None => {
            let role = if state.tenants.count().await? == 0 {
                TenantRole::Admin
            } else {
                TenantRole::User
            };
            let tenant = state.tenants.create(name, &secret_hash, role).await?;
            tracing::info!("registered tenant '{}' ({:?})", tenant.display_name, role);
            tenant
        }
    };

    let claims = Claims::new(tenant.id, tenant.display_name.clone(), tenant.role);
    let token = generate_jwt(&claims).map_err(|e| {
        tracing::error!("JWT generation failed: {}", e);
        ApiError::Internal(e.to_string())
    })?;

    Ok(Json(success_envelope(
        "authenticated",
        json!({
            "token": token,
            "tenant": {
                "id": tenant.id,
                "display_name": tenant.display_name,
                "role": tenant.role,
            },
        }),
    )))
}

/// GET /api/whoami - echo the resolved tenant context
pub async fn whoami(Extension(ctx): Extension<TenantContext>) -> Json<Value> {
    Json(success_envelope(
        "ok",
        json!({
            "tenant_id": ctx.tenant_id,
            "display_name": ctx.display_name,
            "role": ctx.role,
            "via_device": ctx.via_device,
        }),
    ))
}
