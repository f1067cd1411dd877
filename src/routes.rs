use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config;
use crate::handlers;
use crate::middleware::tenant_middleware;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/:resource", post(handlers::actions::action_post))
        .route("/api/whoami", get(handlers::auth::whoami))
        .layer(from_fn_with_state(state.clone(), tenant_middleware));

    let mut router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .route("/auth/login", post(handlers::auth::login))
        // Tenant-scoped API
        .merge(protected)
        .with_state(state);

    let cfg = config::config();
    if cfg.api.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    if cfg.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "message": "ok",
        "data": {
            "name": "Signage API",
            "version": version,
            "description": "Multi-tenant digital signage CMS backend",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "login": "/auth/login (public - token acquisition)",
                "whoami": "/api/whoami (tenant-scoped)",
                "actions": "/api/:resource (tenant-scoped, POST {action, ...})",
            },
            "resources": ["content", "playlist", "emergency_message", "setting", "device", "cliq"],
        }
    }))
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.tenants.ping().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "ok",
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "datastore": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "message": "datastore unavailable",
                "error": "INTERNAL_ERROR",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "datastore_error": e.to_string()
                }
            })),
        ),
    }
}
