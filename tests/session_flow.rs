/**
 * Session Flow Integration Tests
 *
 * End-to-end coverage of the /api/auth surface over in-memory stores:
 * registration, login (with and without the second factor), refresh
 * rotation, logout, and the access-token middleware.
 */
mod common;

use axum::http::StatusCode;
use pretty_assertions::{assert_eq, assert_ne};
use serde_json::json;

use common::{bearer, cookie_pair, post_json, register_user, request, set_cookie, test_app};

#[tokio::test]
async fn test_register_returns_token_cookie_and_sanitized_user() {
    let app = test_app();

    let (status, headers, body) = post_json(
        &app,
        "/api/auth/register",
        json!({
            "username": "alice",
            "email": "alice@example.com",
            "display_name": "Alice",
            "password": "Sup3rSecret!",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(!body["data"]["access_token"].as_str().unwrap().is_empty());

    // Sanitized user: profile fields only, no secrets of any kind.
    let user = &body["data"]["user"];
    assert_eq!(user["username"], "alice");
    assert_eq!(user["totp_enabled"], false);
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());
    assert!(user.get("totp_seed").is_none());

    // No 2FA requested, so no enrollment payload.
    assert!(body["data"].get("two_factor").is_none());

    // Refresh token travels only in the HttpOnly cookie, scoped to the auth
    // endpoints.
    let cookie = set_cookie(&headers);
    assert!(cookie.starts_with("veilchat_refresh="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/api/auth"));

    // The refresh token itself never appears in the body.
    let refresh_token = cookie_pair(&headers)
        .unwrap()
        .trim_start_matches("veilchat_refresh=")
        .to_string();
    assert!(!body.to_string().contains(&refresh_token));
}

#[tokio::test]
async fn test_register_validation_collects_every_rule() {
    let app = test_app();

    let (status, _, body) = post_json(
        &app,
        "/api/auth/register",
        json!({
            "username": "x",
            "email": "not-an-email",
            "display_name": "",
            "password": "short",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    // One response lists everything wrong, not just the first rule.
    assert!(body["details"].as_array().unwrap().len() >= 4, "details: {body}");
}

#[tokio::test]
async fn test_duplicate_registration_conflicts_without_naming_field() {
    let app = test_app();
    register_user(&app, "alice").await;

    let (status, _, body) = post_json(
        &app,
        "/api/auth/register",
        json!({
            "username": "alice",
            "email": "other@example.com",
            "display_name": "Other",
            "password": "Sup3rSecret!",
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert!(!body["error"].as_str().unwrap().contains("username"));
}

#[tokio::test]
async fn test_login_accepts_username_or_email() {
    let app = test_app();
    register_user(&app, "alice").await;

    for identifier in ["alice", "alice@example.com"] {
        let (status, headers, body) = post_json(
            &app,
            "/api/auth/login",
            json!({ "identifier": identifier, "password": "Sup3rSecret!" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login as {identifier}: {body}");
        assert!(cookie_pair(&headers).is_some());
    }
}

#[tokio::test]
async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
    let app = test_app();
    register_user(&app, "alice").await;

    let (status_known, _, body_known) = post_json(
        &app,
        "/api/auth/login",
        json!({ "identifier": "alice", "password": "WrongPass1!" }),
    )
    .await;
    let (status_unknown, _, body_unknown) = post_json(
        &app,
        "/api/auth/login",
        json!({ "identifier": "nobody", "password": "WrongPass1!" }),
    )
    .await;

    assert_eq!(status_known, StatusCode::UNAUTHORIZED);
    assert_eq!(status_unknown, StatusCode::UNAUTHORIZED);
    // Byte-identical bodies: the response never confirms an account exists.
    assert_eq!(body_known, body_unknown);
}

#[tokio::test]
async fn test_me_requires_valid_access_token() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;

    let (status, _, body) = request(&app, "GET", "/api/auth/me", None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "no token: {body}");

    let (status, _, _) = request(
        &app,
        "GET",
        "/api/auth/me",
        None,
        &[bearer("not-a-token")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = request(
        &app,
        "GET",
        "/api/auth/me",
        None,
        &[bearer(&alice.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");
}

#[tokio::test]
async fn test_refresh_rotates_and_old_token_becomes_unusable() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;

    // First rotation succeeds and hands out a different cookie.
    let (status, headers, body) = request(
        &app,
        "POST",
        "/api/auth/refresh",
        None,
        &[("cookie", alice.refresh_cookie.clone())],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "first refresh: {body}");
    assert!(!body["data"]["access_token"].as_str().unwrap().is_empty());
    let rotated = cookie_pair(&headers).unwrap();
    assert_ne!(rotated, alice.refresh_cookie);

    // The superseded token is single-use: replaying it is a hard 401 that
    // also clears the cookie.
    let (status, headers, body) = request(
        &app,
        "POST",
        "/api/auth/refresh",
        None,
        &[("cookie", alice.refresh_cookie.clone())],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "replay: {body}");
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(set_cookie(&headers).contains("Max-Age=0"));

    // The rotated token still works.
    let (status, _, _) = request(
        &app,
        "POST",
        "/api/auth/refresh",
        None,
        &[("cookie", rotated)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_without_cookie_is_unauthorized() {
    let app = test_app();

    let (status, headers, body) = request(&app, "POST", "/api/auth/refresh", None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(set_cookie(&headers).contains("Max-Age=0"));
}

#[tokio::test]
async fn test_access_token_is_not_a_refresh_token() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;

    let (status, _, _) = request(
        &app,
        "POST",
        "/api/auth/refresh",
        None,
        &[("cookie", format!("veilchat_refresh={}", alice.access_token))],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_the_session() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;

    let (status, headers, body) = request(
        &app,
        "POST",
        "/api/auth/logout",
        None,
        &[("cookie", alice.refresh_cookie.clone())],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["logged_out"], true);
    assert!(set_cookie(&headers).contains("Max-Age=0"));

    // The revoked refresh token no longer rotates.
    let (status, _, _) = request(
        &app,
        "POST",
        "/api/auth/refresh",
        None,
        &[("cookie", alice.refresh_cookie)],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_cookie_still_succeeds() {
    let app = test_app();
    let (status, _, body) = request(&app, "POST", "/api/auth/logout", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["logged_out"], true);
}

#[tokio::test]
async fn test_two_factor_login_round_trip() {
    let app = test_app();

    let (status, _, body) = post_json(
        &app,
        "/api/auth/register",
        json!({
            "username": "alice",
            "email": "alice@example.com",
            "display_name": "Alice",
            "password": "Sup3rSecret!",
            "enable_2fa": true,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register: {body}");

    // Enrollment payload is returned exactly once, at registration.
    let seed = body["data"]["two_factor"]["seed"].as_str().unwrap().to_string();
    assert!(body["data"]["two_factor"]["provisioning_uri"]
        .as_str()
        .unwrap()
        .starts_with("otpauth://totp/"));
    assert_eq!(body["data"]["user"]["totp_enabled"], true);

    // Correct password but no code: the distinct re-prompt signal.
    let (status, _, body) = post_json(
        &app,
        "/api/auth/login",
        json!({ "identifier": "alice", "password": "Sup3rSecret!" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TWO_FACTOR_REQUIRED");

    // Malformed code is rejected as an invalid code, not as bad credentials.
    let (status, _, body) = post_json(
        &app,
        "/api/auth/login",
        json!({ "identifier": "alice", "password": "Sup3rSecret!", "totp_code": "12345" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TWO_FACTOR_CODE");

    // A current code computed from the enrolled seed logs in.
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let code = veilchat::backend::auth::twofactor::code_at(&seed, now).unwrap();
    let (status, _, body) = post_json(
        &app,
        "/api/auth/login",
        json!({ "identifier": "alice", "password": "Sup3rSecret!", "totp_code": code }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "2fa login: {body}");
    assert_eq!(body["data"]["user"]["username"], "alice");
}

#[tokio::test]
async fn test_login_attempts_are_throttled_per_identifier() {
    let app = test_app();
    register_user(&app, "alice").await;
    register_user(&app, "bob").await;

    // Exhaust alice's window with failed attempts.
    let mut last_status = StatusCode::OK;
    let mut last_headers = axum::http::HeaderMap::new();
    let mut last_body = serde_json::Value::Null;
    for _ in 0..11 {
        let (status, headers, body) = post_json(
            &app,
            "/api/auth/login",
            json!({ "identifier": "alice", "password": "WrongPass1!" }),
        )
        .await;
        last_status = status;
        last_headers = headers;
        last_body = body;
    }

    assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS, "{last_body}");
    assert_eq!(last_body["code"], "RATE_LIMITED");
    assert!(last_body["retry_after"].as_u64().is_some());
    assert!(last_headers.get("retry-after").is_some());

    // The throttle is keyed per identifier; bob is unaffected.
    let (status, _, body) = post_json(
        &app,
        "/api/auth/login",
        json!({ "identifier": "bob", "password": "Sup3rSecret!" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "bob login: {body}");
}
