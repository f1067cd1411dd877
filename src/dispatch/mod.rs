use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::cliq;
use crate::cliq::client::EndpointSpec;
use crate::cliq::flow::call_with_refresh;
use crate::error::ApiError;
use crate::middleware::TenantContext;
use crate::state::AppState;
use crate::store::credentials::IntegrationCredential;
use crate::store::resources::ResourceKind;
use crate::store::tenants::{hash_secret, TenantRole};

/// Parsed inbound envelope: `{"action": string, ...fields}`
pub struct ActionRequest {
    pub action: String,
    pub body: Map<String, Value>,
}

/// The operation registry. Every `(resource, action)` pair the API serves
/// maps to exactly one variant; anything else is `UnknownAction` and is
/// rejected before any datastore access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    List(ResourceKind),
    Get(ResourceKind),
    Create(ResourceKind),
    Update(ResourceKind),
    Delete(ResourceKind),
    DeviceRegister,
    DeviceList,
    CliqSetup,
    CliqStatus,
    CliqChannels,
    CliqMessages,
}

impl Op {
    pub fn lookup(resource: &str, action: &str) -> Option<Op> {
        if let Some(kind) = ResourceKind::parse(resource) {
            return match action {
                "list" => Some(Op::List(kind)),
                "get" => Some(Op::Get(kind)),
                "create" => Some(Op::Create(kind)),
                "update" => Some(Op::Update(kind)),
                "delete" => Some(Op::Delete(kind)),
                _ => None,
            };
        }

        match (resource, action) {
            ("device", "register") => Some(Op::DeviceRegister),
            ("device", "list") => Some(Op::DeviceList),
            ("cliq", "setup") => Some(Op::CliqSetup),
            ("cliq", "status") => Some(Op::CliqStatus),
            ("cliq", "channels") => Some(Op::CliqChannels),
            ("cliq", "messages") => Some(Op::CliqMessages),
            _ => None,
        }
    }

    /// Input fields that must be present; checked before any side effect
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Op::List(_) | Op::DeviceList | Op::CliqStatus | Op::CliqChannels => &[],
            Op::Get(_) | Op::Delete(_) => &["id"],
            Op::Create(_) => &["data"],
            Op::Update(_) => &["id", "data"],
            Op::DeviceRegister => &["label"],
            Op::CliqSetup => &["access_token"],
            Op::CliqMessages => &["channel_id"],
        }
    }
}

/// Look up, validate and execute one operation for the resolved tenant.
pub async fn dispatch(
    state: &AppState,
    ctx: &TenantContext,
    resource: &str,
    request: ActionRequest,
) -> Result<Value, ApiError> {
    let op = Op::lookup(resource, &request.action).ok_or_else(|| ApiError::UnknownAction {
        resource: resource.to_string(),
        action: request.action.clone(),
    })?;

    for name in op.required_fields() {
        if request.body.get(*name).map_or(true, Value::is_null) {
            return Err(ApiError::MissingField { name });
        }
    }

    let tenant_id = effective_tenant(ctx, &request.body)?;
    execute(op, state, tenant_id, &request.body).await
}

/// The tenant every store call is scoped to. Admins resolved via JWT may act
/// on behalf of another tenant through an explicit `tenant_id` body field;
/// everyone else always acts as themselves.
fn effective_tenant(ctx: &TenantContext, body: &Map<String, Value>) -> Result<Uuid, ApiError> {
    if ctx.role == TenantRole::Admin && !ctx.via_device {
        if let Some(value) = body.get("tenant_id") {
            let raw = value.as_str().ok_or_else(|| {
                ApiError::MalformedInput("'tenant_id' must be a string".into())
            })?;
            return Uuid::parse_str(raw)
                .map_err(|_| ApiError::MalformedInput("'tenant_id' is not a valid UUID".into()));
        }
    }
    Ok(ctx.tenant_id)
}

fn id_field(body: &Map<String, Value>) -> Result<Uuid, ApiError> {
    let raw = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or(ApiError::MalformedInput(
            "'id' must be a UUID string".to_string(),
        ))?;
    Uuid::parse_str(raw).map_err(|_| ApiError::MalformedInput("'id' is not a valid UUID".into()))
}

fn str_field<'a>(body: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, ApiError> {
    body.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::MalformedInput(format!("'{}' must be a string", name)))
}

async fn execute(
    op: Op,
    state: &AppState,
    tenant_id: Uuid,
    body: &Map<String, Value>,
) -> Result<Value, ApiError> {
    match op {
        Op::List(kind) => {
            let records = state.resources.list(tenant_id, kind).await?;
            Ok(json!(records))
        }
        Op::Get(kind) => {
            let id = id_field(body)?;
            let record = state
                .resources
                .get(tenant_id, kind, id)
                .await?
                .ok_or_else(|| ApiError::NotFound(kind.label().to_string()))?;
            Ok(json!(record))
        }
        Op::Create(kind) => {
            let data = body.get("data").cloned().unwrap_or(Value::Null);
            let record = state.resources.create(tenant_id, kind, data).await?;
            Ok(json!(record))
        }
        Op::Update(kind) => {
            let id = id_field(body)?;
            let data = body.get("data").cloned().unwrap_or(Value::Null);
            let record = state
                .resources
                .update(tenant_id, kind, id, data)
                .await?
                .ok_or_else(|| ApiError::NotFound(kind.label().to_string()))?;
            Ok(json!(record))
        }
        Op::Delete(kind) => {
            let id = id_field(body)?;
            let deleted = state.resources.delete(tenant_id, kind, id).await?;
            if !deleted {
                return Err(ApiError::NotFound(kind.label().to_string()));
            }
            Ok(json!({ "id": id, "deleted": true }))
        }
        Op::DeviceRegister => {
            let label = str_field(body, "label")?;
            // The plaintext key is returned exactly once; only its hash
            // is stored.
            let key = format!(
                "{}{}",
                Uuid::new_v4().simple(),
                Uuid::new_v4().simple()
            );
            let device = state
                .tenants
                .register_device(tenant_id, label, &hash_secret(&key))
                .await?;
            Ok(json!({ "device": device, "device_key": key }))
        }
        Op::DeviceList => {
            let devices = state.tenants.list_devices(tenant_id).await?;
            Ok(json!(devices))
        }
        Op::CliqSetup => {
            let access_token = str_field(body, "access_token")?;
            let refresh_token = match body.get("refresh_token") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Null) | None => None,
                Some(_) => {
                    return Err(ApiError::MalformedInput(
                        "'refresh_token' must be a string".into(),
                    ))
                }
            };
            let channel_ids = channel_ids_field(body)?;

            let credential = IntegrationCredential {
                access_token: access_token.to_string(),
                refresh_token,
                channel_ids: channel_ids.clone(),
                updated_at: chrono::Utc::now(),
            };
            state
                .credentials
                .put(tenant_id, cliq::INTEGRATION, &credential)
                .await?;
            Ok(json!({ "configured": true, "channel_ids": channel_ids }))
        }
        Op::CliqStatus => {
            // Reports configured-ness and scope, never the tokens themselves
            match state.credentials.get(tenant_id, cliq::INTEGRATION).await? {
                Some(credential) => Ok(json!({
                    "configured": true,
                    "has_refresh_token": credential.refresh_token.is_some(),
                    "channel_ids": credential.channel_ids,
                    "updated_at": credential.updated_at,
                })),
                None => Ok(json!({ "configured": false })),
            }
        }
        Op::CliqChannels => {
            let scope = state
                .credentials
                .get(tenant_id, cliq::INTEGRATION)
                .await?
                .ok_or_else(|| ApiError::NotConfigured(cliq::INTEGRATION.to_string()))?
                .channel_ids;

            let mut payload = call_with_refresh(
                state.upstream.as_ref(),
                state.exchanger.as_ref(),
                state.credentials.as_ref(),
                tenant_id,
                cliq::INTEGRATION,
                &EndpointSpec::get("/channels"),
            )
            .await?;

            // Restrict the listing to the configured channel scope, if any
            if !scope.is_empty() {
                if let Some(channels) = payload
                    .get_mut("channels")
                    .and_then(Value::as_array_mut)
                {
                    channels.retain(|channel| {
                        channel
                            .get("channel_id")
                            .or_else(|| channel.get("id"))
                            .and_then(Value::as_str)
                            .map_or(false, |id| scope.iter().any(|s| s == id))
                    });
                }
            }
            Ok(payload)
        }
        Op::CliqMessages => {
            let channel_id = str_field(body, "channel_id")?;

            let scope = state
                .credentials
                .get(tenant_id, cliq::INTEGRATION)
                .await?
                .ok_or_else(|| ApiError::NotConfigured(cliq::INTEGRATION.to_string()))?
                .channel_ids;

            // A channel outside a non-empty scope is indistinguishable
            // from one that does not exist
            if !scope.is_empty() && !scope.iter().any(|s| s == channel_id) {
                return Err(ApiError::NotFound("channel".to_string()));
            }

            call_with_refresh(
                state.upstream.as_ref(),
                state.exchanger.as_ref(),
                state.credentials.as_ref(),
                tenant_id,
                cliq::INTEGRATION,
                &EndpointSpec::get(format!("/channels/{}/messages", channel_id)),
            )
            .await
        }
    }
}

fn channel_ids_field(body: &Map<String, Value>) -> Result<Vec<String>, ApiError> {
    match body.get("channel_ids") {
        None | Some(Value::Null) => Ok(vec![]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ApiError::MalformedInput("'channel_ids' must be an array of strings".into())
                })
            })
            .collect(),
        Some(_) => Err(ApiError::MalformedInput(
            "'channel_ids' must be an array of strings".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_rejects_unknown_pairs() {
        assert_eq!(Op::lookup("playlist", "bogus"), None);
        assert_eq!(Op::lookup("screens", "list"), None);
        assert_eq!(Op::lookup("cliq", "delete"), None);
    }

    #[test]
    fn lookup_covers_the_registry() {
        assert_eq!(
            Op::lookup("playlist", "list"),
            Some(Op::List(ResourceKind::Playlist))
        );
        assert_eq!(
            Op::lookup("emergency_message", "create"),
            Some(Op::Create(ResourceKind::EmergencyMessage))
        );
        assert_eq!(Op::lookup("device", "register"), Some(Op::DeviceRegister));
        assert_eq!(Op::lookup("cliq", "messages"), Some(Op::CliqMessages));
    }

    #[test]
    fn required_fields_per_operation() {
        assert_eq!(
            Op::Update(ResourceKind::Content).required_fields(),
            &["id", "data"]
        );
        assert_eq!(Op::CliqSetup.required_fields(), &["access_token"]);
        assert!(Op::CliqStatus.required_fields().is_empty());
    }

    #[test]
    fn effective_tenant_ignores_body_for_non_admins() {
        let other = Uuid::new_v4();
        let ctx = TenantContext {
            tenant_id: Uuid::new_v4(),
            display_name: "t".into(),
            role: TenantRole::User,
            via_device: false,
        };
        let mut body = Map::new();
        body.insert("tenant_id".into(), json!(other.to_string()));

        assert_eq!(effective_tenant(&ctx, &body).unwrap(), ctx.tenant_id);
    }

    #[test]
    fn effective_tenant_honors_admin_override_but_not_for_devices() {
        let other = Uuid::new_v4();
        let mut body = Map::new();
        body.insert("tenant_id".into(), json!(other.to_string()));

        let admin = TenantContext {
            tenant_id: Uuid::new_v4(),
            display_name: "hq".into(),
            role: TenantRole::Admin,
            via_device: false,
        };
        assert_eq!(effective_tenant(&admin, &body).unwrap(), other);

        let device = TenantContext {
            via_device: true,
            ..admin.clone()
        };
        assert_eq!(effective_tenant(&device, &body).unwrap(), device.tenant_id);
    }
}
