mod common;

use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn health_and_root_respond() {
    let h = common::harness();

    let (status, body) = common::send(&h.app, "GET", "/health", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = common::send(&h.app, "GET", "/", &[], None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Signage API");
}

#[tokio::test]
async fn login_registers_then_authenticates() {
    let h = common::harness();

    let (token, tenant_id) = common::login(&h.app, "lobby-screens").await;
    assert!(!token.is_empty());

    // Same name, same secret: same tenant
    let (_, second_id) = common::login(&h.app, "lobby-screens").await;
    assert_eq!(tenant_id, second_id);

    // Same name, wrong secret: refused
    let (status, body) = common::send(
        &h.app,
        "POST",
        "/auth/login",
        &[],
        Some(json!({ "name": "lobby-screens", "secret": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NO_TENANT_IDENTITY");
}

#[tokio::test]
async fn unauthenticated_requests_never_get_a_default_tenant() {
    let h = common::harness();

    let (status, body) = common::send(&h.app, "GET", "/api/whoami", &[], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NO_TENANT_IDENTITY");

    let (status, _) = common::send(
        &h.app,
        "POST",
        "/api/playlist",
        &[],
        Some(json!({ "action": "list" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_bearer_is_rejected() {
    let h = common::harness();
    common::login(&h.app, "someone").await;

    let (status, body) = common::send(
        &h.app,
        "GET",
        "/api/whoami",
        &[("authorization", "Bearer not-a-jwt")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NO_TENANT_IDENTITY");
}

#[tokio::test]
async fn registered_device_key_resolves_its_tenant() {
    let h = common::harness();
    let (token, tenant_id) = common::login(&h.app, "lobby-screens").await;

    let (status, body) = common::post_action(
        &h.app,
        &token,
        "device",
        json!({ "action": "register", "label": "hallway player" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let key = body["data"]["device_key"].as_str().unwrap().to_string();

    let (status, body) = common::send(
        &h.app,
        "GET",
        "/api/whoami",
        &[("x-device-key", key.as_str())],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["tenant_id"], json!(tenant_id));
    assert_eq!(body["data"]["via_device"], true);

    let (status, _) = common::send(
        &h.app,
        "GET",
        "/api/whoami",
        &[("x-device-key", "bogus-key")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
