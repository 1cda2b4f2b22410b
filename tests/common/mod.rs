#![allow(dead_code)]
//! Integration Test Helpers
//!
//! Builds the full application over the in-memory stores and drives it
//! through `tower::ServiceExt::oneshot`, so the whole HTTP surface is
//! exercised without binding a port or touching a database.

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use veilchat::backend::auth::store::MemoryCredentialStore;
use veilchat::backend::delivery::store::MemoryMessageStore;
use veilchat::backend::server::{create_app_with_stores, ServerConfig};

pub fn test_config() -> ServerConfig {
    ServerConfig {
        jwt_secret: "integration-test-secret".to_string(),
        access_ttl_secs: 900,
        refresh_ttl_secs: 3600,
        totp_key: [11u8; 32],
        port: 0,
    }
}

/// Full router over fresh in-memory stores.
pub fn test_app() -> Router {
    create_app_with_stores(
        test_config(),
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemoryMessageStore::new()),
        None,
    )
}

/// One request through the router; returns status, response headers, and the
/// parsed JSON body (Null when the body is empty).
pub async fn request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
    headers: &[(&str, String)],
) -> (StatusCode, HeaderMap, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }

    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let response_headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, response_headers, json)
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, HeaderMap, serde_json::Value) {
    request(app, "POST", uri, Some(body), &[]).await
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("authorization", format!("Bearer {token}"))
}

/// The `name=value` pair from the first Set-Cookie header, without the
/// attributes; suitable for sending back in a Cookie header.
pub fn cookie_pair(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::SET_COOKIE)?.to_str().ok()?;
    raw.split(';').next().map(|pair| pair.trim().to_string())
}

/// Full first Set-Cookie header value, attributes included.
pub fn set_cookie(headers: &HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub struct TestUser {
    pub user_id: Uuid,
    pub username: String,
    pub access_token: String,
    pub refresh_cookie: String,
}

/// Register a user through the HTTP surface and collect the credentials the
/// rest of a test needs.
pub async fn register_user(app: &Router, username: &str) -> TestUser {
    let (status, headers, body) = post_json(
        app,
        "/api/auth/register",
        serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "display_name": username,
            "password": "Sup3rSecret!",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "registration failed: {body}");

    TestUser {
        user_id: body["data"]["user"]["id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .expect("user id in registration response"),
        username: username.to_string(),
        access_token: body["data"]["access_token"]
            .as_str()
            .expect("access token in registration response")
            .to_string(),
        refresh_cookie: cookie_pair(&headers).expect("refresh cookie on registration"),
    }
}

/// Create a conversation owned by `creator` with the given other members,
/// returning its id.
pub async fn create_conversation(app: &Router, creator: &TestUser, member_ids: &[Uuid]) -> Uuid {
    let (status, _, body) = request(
        app,
        "POST",
        "/api/conversations",
        Some(serde_json::json!({
            "name": "test conversation",
            "is_group": member_ids.len() > 1,
            "member_ids": member_ids,
        })),
        &[bearer(&creator.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "conversation creation failed: {body}");
    body["data"]["id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("conversation id")
}

/// Send a message and return its id.
pub async fn send_message(app: &Router, sender: &TestUser, conversation_id: Uuid, content: &str) -> Uuid {
    let (status, _, body) = request(
        app,
        "POST",
        "/api/messages",
        Some(serde_json::json!({
            "conversation_id": conversation_id,
            "content": content,
        })),
        &[bearer(&sender.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "send failed: {body}");
    body["data"]["id"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .expect("message id")
}
