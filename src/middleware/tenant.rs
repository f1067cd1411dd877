use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::tenants::{hash_secret, TenantRole, TenantStore};

/// Header carrying a pre-authorized playback device key
pub const DEVICE_KEY_HEADER: &str = "x-device-key";

/// The single authoritative acting-tenant value for a request. Passed
/// explicitly into every operation; there is no ambient current-tenant state.
#[derive(Clone, Debug)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub display_name: String,
    pub role: TenantRole,
    /// True when resolved via a device key; device callers never get the
    /// admin act-on-behalf fallback.
    pub via_device: bool,
}

/// Resolve the acting tenant for a request, or refuse.
///
/// Order: verified bearer JWT first, then a registered device key. There is
/// no default tenant; a request that matches neither is rejected. A bearer
/// that is present but invalid fails immediately rather than falling through.
pub async fn resolve(
    headers: &HeaderMap,
    tenants: &dyn TenantStore,
) -> Result<TenantContext, ApiError> {
    if let Some(value) = headers.get("authorization") {
        let header = value
            .to_str()
            .map_err(|_| ApiError::NoTenantIdentity("Invalid Authorization header".into()))?;
        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::NoTenantIdentity("Authorization header must use Bearer token format".into())
        })?;
        if token.trim().is_empty() {
            return Err(ApiError::NoTenantIdentity("Empty bearer token".into()));
        }

        let claims = auth::validate_jwt(token)
            .map_err(|e| ApiError::NoTenantIdentity(e.to_string()))?;

        let tenant = tenants
            .get(claims.tenant_id)
            .await?
            .filter(|t| t.active)
            .ok_or_else(|| {
                ApiError::NoTenantIdentity("Tenant does not exist or is deactivated".into())
            })?;

        return Ok(TenantContext {
            tenant_id: tenant.id,
            display_name: tenant.display_name,
            role: tenant.role,
            via_device: false,
        });
    }

    if let Some(value) = headers.get(DEVICE_KEY_HEADER) {
        let key = value
            .to_str()
            .map_err(|_| ApiError::NoTenantIdentity("Invalid device key header".into()))?;

        let tenant = tenants
            .find_by_device_key(&hash_secret(key))
            .await?
            .filter(|t| t.active)
            .ok_or_else(|| ApiError::NoTenantIdentity("Unknown device key".into()))?;

        // Devices act with plain user privileges regardless of tenant role
        return Ok(TenantContext {
            tenant_id: tenant.id,
            display_name: tenant.display_name,
            role: TenantRole::User,
            via_device: true,
        });
    }

    Err(ApiError::NoTenantIdentity("Authentication required".into()))
}

/// Middleware injecting a `TenantContext` extension, or rejecting with 401
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx = resolve(request.headers(), state.tenants.as_ref()).await?;
    tracing::debug!("resolved tenant {} ({})", ctx.display_name, ctx.tenant_id);
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
