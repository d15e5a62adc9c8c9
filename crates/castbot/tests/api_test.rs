//! Integration tests for the dashboard API
//!
//! Run with: cargo test -p castbot --test api_test

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use castcore::core::types::BroadcastStatus;
use castcore::storage::broadcasts::{create_broadcast, set_broadcast_status};
use castcore::storage::NewBroadcast;
use common::{RecordingGateway, TestApp, TOKEN};

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_api_requires_token() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/api/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Unauthorized"}));

    let (status, _) = app.send(Method::GET, "/api/users", None, Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send(Method::GET, "/api/auth/me", None, Some(TOKEN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"authenticated": true}));
}

#[tokio::test]
async fn test_create_broadcast_validation_details() {
    let app = TestApp::new();
    let (status, body) = app.post("/api/broadcasts", json!({"message": "Hi"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid broadcast data");
    assert!(body["details"]["title"].as_array().is_some_and(|m| !m.is_empty()));
    assert!(body["details"].get("message").is_none());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();
    let (status, body) = app.post("/api/broadcasts", json!(["not", "an", "object"])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_unknown_and_invalid_ids() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/broadcasts/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Broadcast not found"}));

    let (status, _) = app.get("/api/broadcasts/999/deliveries").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::POST, "/api/broadcasts/999/send", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/broadcasts/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.delete("/api/users/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");
}

#[tokio::test]
async fn test_create_then_send_flow() {
    let app = TestApp::new();
    app.recipient("101");
    app.recipient("102");

    let (status, created) = app
        .post("/api/broadcasts", json!({"title": "Sale", "message": "50% off today"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "draft");
    let id = created["id"].as_i64().unwrap();

    let (status, ack) = app.call(Method::POST, &format!("/api/broadcasts/{}/send", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["broadcastId"], id);
    assert_eq!(ack["recipientCount"], 2);

    app.settle().await;

    let (_, broadcast) = app.get(&format!("/api/broadcasts/{}", id)).await;
    assert_eq!(broadcast["status"], "sent");
    assert_eq!(broadcast["totalRecipients"], 2);
    assert_eq!(broadcast["successfulDeliveries"], 2);
    assert_eq!(broadcast["failedDeliveries"], 0);
    assert!(broadcast["sentAt"].is_string());

    let (status, deliveries) = app.get(&format!("/api/broadcasts/{}/deliveries", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deliveries.as_array().map(Vec::len), Some(2));
    assert_eq!(deliveries[0]["status"], "delivered");

    let texts = app.gateway.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts.iter().all(|(_, text)| text == "50% off today"));

    let (status, body) = app.call(Method::POST, &format!("/api/broadcasts/{}/send", id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Broadcast has already been sent");
    assert_eq!(app.gateway.texts().len(), 2);

    let (_, stats) = app.get("/api/dashboard/stats").await;
    assert_eq!(stats["totalUsers"], 2);
    assert_eq!(stats["messagesSent"], 1);
    assert_eq!(stats["deliveryRate"], 100.0);
}

#[tokio::test]
async fn test_quick_broadcast() {
    let app = TestApp::new();

    let (status, body) = app.post("/api/broadcasts/quick", json!({"message": "   "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message is required");

    let (status, body) = app.post("/api/broadcasts/quick", json!({"message": "Hello"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No active users to send message to");
    let (_, list) = app.get("/api/broadcasts").await;
    assert_eq!(list, json!([]));

    app.recipient("7");
    let (status, ack) = app.post("/api/broadcasts/quick", json!({"message": "  Hello  "})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["message"], "Quick broadcast started");
    assert_eq!(ack["recipientCount"], 1);

    app.settle().await;
    assert_eq!(app.gateway.texts(), vec![("7".to_string(), "Hello".to_string())]);

    let (_, list) = app.get("/api/broadcasts").await;
    assert!(list[0]["title"].as_str().unwrap().starts_with("Quick Broadcast - "));
    assert_eq!(list[0]["status"], "sent");
}

/// Breaks the recipient query while leaving `COUNT(*)` over users working.
fn break_recipient_listing(app: &TestApp) {
    app.conn()
        .execute("ALTER TABLE users RENAME COLUMN last_active_at TO last_seen_at", [])
        .unwrap();
}

#[tokio::test]
async fn test_send_marks_broadcast_failed_when_recipients_cannot_load() {
    let app = TestApp::new();
    app.recipient("1");
    let (_, created) = app.post("/api/broadcasts", json!({"title": "T", "message": "m"})).await;
    let id = created["id"].as_i64().unwrap();

    break_recipient_listing(&app);
    let (status, body) = app.call(Method::POST, &format!("/api/broadcasts/{}/send", id), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to send broadcast");

    let (_, broadcast) = app.get(&format!("/api/broadcasts/{}", id)).await;
    assert_eq!(broadcast["status"], "failed");
    assert!(app.gateway.texts().is_empty());

    let (status, _) = app.delete(&format!("/api/broadcasts/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_quick_broadcast_marked_failed_when_recipients_cannot_load() {
    let app = TestApp::new();
    app.recipient("1");

    break_recipient_listing(&app);
    let (status, _) = app.post("/api/broadcasts/quick", json!({"message": "Hello"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, list) = app.get("/api/broadcasts").await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
    assert_eq!(list[0]["status"], "failed");
    assert!(app.gateway.texts().is_empty());
}

#[tokio::test]
async fn test_send_error_names_the_current_status() {
    let app = TestApp::new();
    let scheduled_for = (Utc::now() + Duration::hours(2)).to_rfc3339();
    let (status, created) = app
        .post(
            "/api/broadcasts",
            json!({"title": "Later", "message": "m", "status": "scheduled", "scheduledFor": scheduled_for}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let (status, body) = app.call(Method::POST, &format!("/api/broadcasts/{}/send", id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only draft broadcasts can be sent (status: scheduled)");

    let busy = {
        let conn = app.conn();
        let broadcast = create_broadcast(&conn, &NewBroadcast::new("Busy", "in flight")).unwrap();
        set_broadcast_status(&conn, broadcast.id, BroadcastStatus::Sending).unwrap();
        broadcast.id
    };
    let (status, body) = app.call(Method::POST, &format!("/api/broadcasts/{}/send", busy), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Broadcast is already being sent");
}

#[tokio::test]
async fn test_broadcast_list_limit_and_delete() {
    let app = TestApp::new();
    for i in 0..3 {
        app.post("/api/broadcasts", json!({"title": format!("B{}", i), "message": "m"}))
            .await;
    }

    let (_, limited) = app.get("/api/broadcasts?limit=2").await;
    assert_eq!(limited.as_array().map(Vec::len), Some(2));
    assert_eq!(limited[0]["title"], "B2");

    let (status, _) = app.get("/api/broadcasts?limit=lots").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = limited[0]["id"].as_i64().unwrap();
    let (status, body) = app.delete(&format!("/api/broadcasts/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Broadcast deleted successfully");
    let (status, _) = app.delete(&format!("/api/broadcasts/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sending_broadcast_cannot_be_deleted() {
    let app = TestApp::new();
    let id = {
        let conn = app.conn();
        let broadcast = create_broadcast(&conn, &NewBroadcast::new("Busy", "in flight")).unwrap();
        set_broadcast_status(&conn, broadcast.id, BroadcastStatus::Sending).unwrap();
        broadcast.id
    };

    let (status, _) = app.delete(&format!("/api/broadcasts/{}", id)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get(&format!("/api/broadcasts/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_user_status_toggle() {
    let app = TestApp::new();
    let user = app.recipient("55");

    let (status, body) = app
        .patch(&format!("/api/users/{}/status", user.id), json!({"isActive": "no"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "isActive must be a boolean");

    let (status, body) = app
        .patch(&format!("/api/users/{}", user.id), json!({"isActive": false}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deactivated");

    let (_, fetched) = app.get(&format!("/api/users/{}", user.id)).await;
    assert_eq!(fetched["isActive"], false);
    assert_eq!(fetched["telegramId"], "55");

    let (_, stats) = app.get("/api/users/stats").await;
    assert_eq!(stats["total"], 0);

    let (status, body) = app.delete(&format!("/api/users/{}", user.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User removed successfully");
    let (_, users) = app.get("/api/users").await;
    assert_eq!(users, json!([]));
}

#[tokio::test]
async fn test_scheduled_message_lifecycle() {
    let app = TestApp::new();
    app.recipient("1");

    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let (status, body) = app
        .post(
            "/api/scheduled-messages",
            json!({"title": "Late", "message": "m", "scheduledFor": past}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"]["scheduledFor"].is_array());

    let future = (Utc::now() + Duration::hours(1)).to_rfc3339();
    let (status, created) = app
        .post(
            "/api/scheduled-messages",
            json!({"title": "Soon", "message": "m", "scheduledFor": future}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["recipientCount"], 1);
    let id = created["id"].as_i64().unwrap();

    let (status, updated) = app
        .patch(&format!("/api/scheduled-messages/{}", id), json!({"title": "Sooner"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Sooner");
    assert_eq!(updated["message"], "m");

    let uri = format!("/api/scheduled-messages/{}/cancel", id);
    let (status, body) = app.call(Method::PATCH, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Scheduled message cancelled successfully");

    let (status, _) = app.call(Method::PATCH, &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.patch("/api/scheduled-messages/999", json!({"title": "x"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Scheduled message not found");
    let (status, _) = app
        .patch("/api/scheduled-messages/999", json!({"scheduledFor": past}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.delete(&format!("/api/scheduled-messages/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = app.get("/api/scheduled-messages").await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_welcome_settings_round_trip() {
    let app = TestApp::new();

    let (status, defaults) = app.get("/api/settings/welcome").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(defaults["imageUrl"], "");
    assert!(!defaults["title"].as_str().unwrap().is_empty());

    let (status, body) = app
        .post(
            "/api/settings/welcome",
            json!({"title": "Hi", "description": "Welcome", "buttonText": "Share", "imageUrl": "ftp://x"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation error");
    assert!(body["details"]["imageUrl"].is_array());

    let settings = json!({
        "title": "Hi",
        "description": "Welcome",
        "buttonText": "Share",
        "imageUrl": "https://example.com/w.png"
    });
    let (status, body) = app.post("/api/settings/welcome", settings.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome message settings updated successfully");

    let (_, stored) = app.get("/api/settings/welcome").await;
    assert_eq!(stored, settings);

    let (_, row) = app.get("/api/settings/welcome_title").await;
    assert_eq!(row["value"], "Hi");
}

#[tokio::test]
async fn test_generic_settings() {
    let app = TestApp::new();

    let (status, missing) = app.get("/api/settings/theme").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(missing, json!({"key": "theme", "value": null}));

    let (status, body) = app.post("/api/settings", json!({"key": "theme"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Key and value are required");

    let (status, saved) = app.post("/api/settings", json!({"key": "theme", "value": "dark"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["key"], "theme");
    assert_eq!(saved["value"], "dark");

    let (_, fetched) = app.get("/api/settings/theme").await;
    assert_eq!(fetched["value"], "dark");
}

#[tokio::test]
async fn test_welcome_test_send() {
    let app = TestApp::new();

    let (status, body) = app.post("/api/test/welcome-message", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Chat ID is required for testing");

    let (status, body) = app.post("/api/test/welcome-message", json!({"chatId": 555})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Text message sent (no image configured)");
    assert_eq!(app.gateway.texts().len(), 1);
    assert_eq!(app.gateway.texts()[0].0, "555");
}

#[tokio::test]
async fn test_welcome_test_falls_back_to_text() {
    let app = TestApp::with_gateway(RecordingGateway::failing_photos());
    app.post(
        "/api/settings/welcome",
        json!({"title": "Hi", "description": "Welcome", "buttonText": "Share", "imageUrl": "https://example.com/w.png"}),
    )
    .await;

    let (status, body) = app.post("/api/test/welcome-message", json!({"chatId": "777"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Image failed, text sent instead");
    assert_eq!(body["error"], "wrong file identifier");
    assert_eq!(app.gateway.texts(), vec![("777".to_string(), "Hi\n\nWelcome".to_string())]);
}

#[tokio::test]
async fn test_bot_status() {
    let app = TestApp::new();
    let (status, body) = app.get("/api/bot/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"username": "cast_test_bot", "firstName": "Cast", "isOnline": true})
    );
}
