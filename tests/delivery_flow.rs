/**
 * Delivery Flow Integration Tests
 *
 * End-to-end coverage of the conversation and message surface over
 * in-memory stores: sending, history pagination, the monotonic status
 * progression, reactions, edit/delete permissions, and membership checks.
 */
mod common;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use common::{bearer, create_conversation, register_user, request, send_message, test_app};

#[tokio::test]
async fn test_create_conversation_and_list_for_both_members() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;

    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;

    for user in [&alice, &bob] {
        let (status, _, body) = request(
            &app,
            "GET",
            "/api/conversations",
            None,
            &[bearer(&user.access_token)],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<String> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert!(ids.contains(&conversation_id.to_string()), "{}: {ids:?}", user.username);
    }
}

#[tokio::test]
async fn test_conversation_needs_at_least_one_other_member() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;

    let (status, _, body) = request(
        &app,
        "POST",
        "/api/conversations",
        Some(json!({ "member_ids": [] })),
        &[bearer(&alice.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_send_and_read_history_in_order() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;

    let first = send_message(&app, &alice, conversation_id, "first").await;
    let second = send_message(&app, &bob, conversation_id, "second").await;

    let (status, _, body) = request(
        &app,
        "GET",
        &format!("/api/conversations/{conversation_id}/messages"),
        None,
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);

    // Oldest first.
    let messages = body["data"]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["id"], first.to_string());
    assert_eq!(messages[0]["content"], "first");
    assert_eq!(messages[1]["id"], second.to_string());
}

#[tokio::test]
async fn test_history_pagination_and_clamping() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;

    for i in 0..3 {
        send_message(&app, &alice, conversation_id, &format!("m{i}")).await;
    }

    let (status, _, body) = request(
        &app,
        "GET",
        &format!("/api/conversations/{conversation_id}/messages?limit=2&offset=0"),
        None,
        &[bearer(&alice.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["total"], 3);

    let (_, _, body) = request(
        &app,
        "GET",
        &format!("/api/conversations/{conversation_id}/messages?limit=2&offset=2"),
        None,
        &[bearer(&alice.access_token)],
    )
    .await;
    let tail = body["data"]["messages"].as_array().unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0]["content"], "m2");

    // A zero limit is clamped up, never an empty page by accident.
    let (_, _, body) = request(
        &app,
        "GET",
        &format!("/api/conversations/{conversation_id}/messages?limit=0"),
        None,
        &[bearer(&alice.access_token)],
    )
    .await;
    assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_participant_is_locked_out() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let carol = register_user(&app, "carol").await;
    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;

    let (status, _, body) = request(
        &app,
        "POST",
        "/api/messages",
        Some(json!({ "conversation_id": conversation_id, "content": "hi" })),
        &[bearer(&carol.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");

    let (status, _, _) = request(
        &app,
        "GET",
        &format!("/api/conversations/{conversation_id}/messages"),
        None,
        &[bearer(&carol.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A conversation that does not exist at all is a 404, not a 403.
    let (status, _, _) = request(
        &app,
        "POST",
        "/api/messages",
        Some(json!({ "conversation_id": Uuid::new_v4(), "content": "hi" })),
        &[bearer(&carol.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_message_content_rejected() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;

    let (status, _, body) = request(
        &app,
        "POST",
        "/api/messages",
        Some(json!({ "conversation_id": conversation_id, "content": "   " })),
        &[bearer(&alice.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_status_moves_forward_and_never_back() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;
    let message_id = send_message(&app, &alice, conversation_id, "hello").await;

    // Bob reports delivery.
    let (status, _, body) = request(
        &app,
        "PUT",
        &format!("/api/messages/{message_id}/status"),
        Some(json!({ "status": "delivered" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "delivered");
    assert!(body["data"]["delivered_at"].is_string());
    assert!(body["data"]["read_at"].is_null());
    let delivered_at = body["data"]["delivered_at"].clone();

    // Then read.
    let (_, _, body) = request(
        &app,
        "PUT",
        &format!("/api/messages/{message_id}/status"),
        Some(json!({ "status": "read" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(body["data"]["status"], "read");
    assert!(body["data"]["read_at"].is_string());
    // The delivery timestamp is set once and never rewritten.
    assert_eq!(body["data"]["delivered_at"], delivered_at);

    // A late delivery report cannot regress the row.
    let (status, _, body) = request(
        &app,
        "PUT",
        &format!("/api/messages/{message_id}/status"),
        Some(json!({ "status": "delivered" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "read");
    assert_eq!(body["data"]["delivered_at"], delivered_at);
}

#[tokio::test]
async fn test_read_backfills_delivery() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;
    let message_id = send_message(&app, &alice, conversation_id, "hello").await;

    // Straight to read: the delivery timestamp comes along.
    let (_, _, body) = request(
        &app,
        "PUT",
        &format!("/api/messages/{message_id}/status"),
        Some(json!({ "status": "read" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(body["data"]["status"], "read");
    assert!(body["data"]["delivered_at"].is_string());
    assert!(body["data"]["read_at"].is_string());
}

#[tokio::test]
async fn test_low_status_targets_are_silent_no_ops() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;
    let message_id = send_message(&app, &alice, conversation_id, "hello").await;

    // Before any report, "sent"/"pending" change nothing and return the row.
    for target in ["sent", "pending"] {
        let (status, _, body) = request(
            &app,
            "PUT",
            &format!("/api/messages/{message_id}/status"),
            Some(json!({ "status": target })),
            &[bearer(&bob.access_token)],
        )
        .await;
        assert_eq!(status, StatusCode::OK, "target {target}: {body}");
        assert_eq!(body["data"]["status"], "pending");
    }

    // Nor can they undo a real report.
    let (_, _, _) = request(
        &app,
        "PUT",
        &format!("/api/messages/{message_id}/status"),
        Some(json!({ "status": "delivered" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    let (status, _, body) = request(
        &app,
        "PUT",
        &format!("/api/messages/{message_id}/status"),
        Some(json!({ "status": "sent" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "delivered");
}

#[tokio::test]
async fn test_reaction_is_orthogonal_to_delivery_status() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;
    let message_id = send_message(&app, &alice, conversation_id, "hello").await;

    // Reacting before any delivery report neither implies nor blocks it.
    let (status, _, body) = request(
        &app,
        "POST",
        &format!("/api/messages/{message_id}/reaction"),
        Some(json!({ "emoji": "👍" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["emoji"], "👍");

    let (_, _, body) = request(
        &app,
        "PUT",
        &format!("/api/messages/{message_id}/status"),
        Some(json!({ "status": "delivered" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    // Status starts its own progression; the reaction did not advance it.
    assert_eq!(body["data"]["status"], "delivered");
    assert_eq!(body["data"]["reaction"], "👍");

    // A second reaction replaces the first for the same user.
    let (_, _, body) = request(
        &app,
        "POST",
        &format!("/api/messages/{message_id}/reaction"),
        Some(json!({ "emoji": "❤️" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(body["data"]["emoji"], "❤️");
}

#[tokio::test]
async fn test_edit_is_sender_only() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let conversation_id = create_conversation(&app, &alice, &[bob.user_id]).await;
    let message_id = send_message(&app, &alice, conversation_id, "draft").await;

    let (status, _, _) = request(
        &app,
        "PUT",
        &format!("/api/messages/{message_id}"),
        Some(json!({ "content": "hijacked" })),
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = request(
        &app,
        "PUT",
        &format!("/api/messages/{message_id}"),
        Some(json!({ "content": "final" })),
        &[bearer(&alice.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["content"], "final");
    assert_eq!(body["data"]["is_edited"], true);
}

#[tokio::test]
async fn test_delete_by_sender_or_admin_hides_from_history() {
    let app = test_app();
    let alice = register_user(&app, "alice").await;
    let bob = register_user(&app, "bob").await;
    let carol = register_user(&app, "carol").await;
    let conversation_id =
        create_conversation(&app, &alice, &[bob.user_id, carol.user_id]).await;

    let own = send_message(&app, &bob, conversation_id, "mine").await;
    let other = send_message(&app, &bob, conversation_id, "also mine").await;

    // A plain member cannot delete someone else's message.
    let (status, _, _) = request(
        &app,
        "DELETE",
        &format!("/api/messages/{other}"),
        None,
        &[bearer(&carol.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The sender can delete their own.
    let (status, _, body) = request(
        &app,
        "DELETE",
        &format!("/api/messages/{own}"),
        None,
        &[bearer(&bob.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success"], true);

    // The conversation admin can delete anyone's.
    let (status, _, _) = request(
        &app,
        "DELETE",
        &format!("/api/messages/{other}"),
        None,
        &[bearer(&alice.access_token)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Deleted messages drop out of history entirely.
    let (_, _, body) = request(
        &app,
        "GET",
        &format!("/api/conversations/{conversation_id}/messages"),
        None,
        &[bearer(&alice.access_token)],
    )
    .await;
    assert_eq!(body["data"]["total"], 0);
    assert!(body["data"]["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_message_endpoints_require_access_token() {
    let app = test_app();

    let (status, _, _) = request(&app, "GET", "/api/conversations", None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = request(
        &app,
        "POST",
        "/api/messages",
        Some(json!({ "conversation_id": Uuid::new_v4(), "content": "hi" })),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
