#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use signage_api::cliq::client::{EndpointSpec, UpstreamApi, UpstreamError};
use signage_api::cliq::token::{RefreshError, TokenExchanger, TokenResponse};
use signage_api::routes;
use signage_api::state::AppState;
use signage_api::store::memory::MemoryStore;
use signage_api::store::resources::{ResourceKind, ResourceRecord, ResourceStore};
use signage_api::store::StoreError;

/// Upstream double that replays a scripted sequence of outcomes and counts
/// every call it receives.
pub struct ScriptedUpstream {
    responses: Mutex<VecDeque<Result<Value, UpstreamError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedUpstream {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push_ok(&self, payload: Value) {
        self.responses.lock().unwrap().push_back(Ok(payload));
    }

    pub fn push_auth_expired(&self) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(UpstreamError::AuthExpired));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamApi for ScriptedUpstream {
    async fn call(
        &self,
        _access_token: &str,
        _endpoint: &EndpointSpec,
    ) -> Result<Value, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(UpstreamError::Transport("script exhausted".into())))
    }
}

/// Exchanger double: either always succeeds with the given tokens or always
/// denies, counting calls either way.
pub struct ScriptedExchanger {
    grant: Option<(String, Option<String>)>,
    pub calls: AtomicUsize,
}

impl ScriptedExchanger {
    pub fn granting(access: &str, refresh: Option<&str>) -> Self {
        Self {
            grant: Some((access.to_string(), refresh.map(str::to_string))),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn denying() -> Self {
        Self {
            grant: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchanger for ScriptedExchanger {
    async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.grant {
            Some((access, refresh)) => Ok(TokenResponse {
                access_token: access.clone(),
                refresh_token: refresh.clone(),
                expires_in: Some(3600),
            }),
            None => Err(RefreshError::Denied("invalid_grant".into())),
        }
    }
}

/// Counts every resource-store call so tests can assert "no datastore access"
pub struct CountingResources {
    inner: Arc<MemoryStore>,
    pub calls: AtomicUsize,
}

impl CountingResources {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceStore for CountingResources {
    async fn list(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list(tenant_id, kind).await
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<Option<ResourceRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ResourceStore::get(self.inner.as_ref(), tenant_id, kind, id).await
    }

    async fn create(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        data: Value,
    ) -> Result<ResourceRecord, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ResourceStore::create(self.inner.as_ref(), tenant_id, kind, data).await
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
        data: Value,
    ) -> Result<Option<ResourceRecord>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update(tenant_id, kind, id, data).await
    }

    async fn delete(
        &self,
        tenant_id: Uuid,
        kind: ResourceKind,
        id: Uuid,
    ) -> Result<bool, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(tenant_id, kind, id).await
    }
}

/// Everything a test needs: the assembled router plus handles to the doubles
pub struct Harness {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub upstream: Arc<ScriptedUpstream>,
    pub exchanger: Arc<ScriptedExchanger>,
    pub resources: Arc<CountingResources>,
}

pub fn harness_with_exchanger(exchanger: ScriptedExchanger) -> Harness {
    let store = Arc::new(MemoryStore::default());
    let upstream = Arc::new(ScriptedUpstream::new());
    let exchanger = Arc::new(exchanger);
    let resources = Arc::new(CountingResources::new(store.clone()));

    let state = AppState {
        tenants: store.clone(),
        credentials: store.clone(),
        resources: resources.clone(),
        upstream: upstream.clone(),
        exchanger: exchanger.clone(),
    };

    Harness {
        app: routes::app(state),
        store,
        upstream,
        exchanger,
        resources,
    }
}

pub fn harness() -> Harness {
    harness_with_exchanger(ScriptedExchanger::granting("fresh-access", None))
}

/// Send a request and return (status, parsed JSON body)
pub async fn send(
    app: &Router,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Login (registering on first use) and return (token, tenant id)
pub async fn login(app: &Router, name: &str) -> (String, Uuid) {
    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        &[],
        Some(serde_json::json!({ "name": name, "secret": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);

    let token = body["data"]["token"].as_str().unwrap().to_string();
    let tenant_id = body["data"]["tenant"]["id"]
        .as_str()
        .map(|s| Uuid::parse_str(s).unwrap())
        .unwrap();
    (token, tenant_id)
}

/// POST an action envelope as the given bearer
pub async fn post_action(
    app: &Router,
    token: &str,
    resource: &str,
    body: Value,
) -> (StatusCode, Value) {
    let auth = format!("Bearer {}", token);
    send(
        app,
        "POST",
        &format!("/api/{}", resource),
        &[("authorization", auth.as_str())],
        Some(body),
    )
    .await
}
