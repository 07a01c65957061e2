//! Notification REST + streaming tests
//!
//! Covers cursor pagination (including created_at ties), unread counts,
//! read/delete mutations, and the SSE endpoints.

mod common;

use axum::http::{Method, StatusCode};
use common::app;
use futures::StreamExt;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use time::macros::datetime;
use uuid::Uuid;

use aerovia::domain::notification::NotificationType;

// ===========================================================================
// Listing & pagination
// ===========================================================================

#[tokio::test]
async fn pagination_recovers_all_records_in_order() {
    let app = app().await;
    let user = app.create_user("notif_pages").await;
    let service = app.notification_service();

    let mut created = Vec::new();
    for i in 0..25 {
        let notification = service
            .create_and_publish(user.id, &format!("message {}", i), NotificationType::General)
            .await
            .expect("create failed");
        created.push(notification.id);
    }

    let mut seen: Vec<Uuid> = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;

    loop {
        let path = match &cursor {
            Some(cursor) => format!("/notifications?limit=10&cursor={}", cursor),
            None => "/notifications?limit=10".to_string(),
        };
        let resp = app.get(&path, Some(&user.access_token)).await;
        assert_eq!(resp.status, StatusCode::OK);

        let body = resp.json();
        assert_eq!(body["limit"].as_i64().unwrap(), 10);
        assert_eq!(body["has_previous"].as_bool().unwrap(), cursor.is_some());

        for item in body["items"].as_array().unwrap() {
            seen.push(Uuid::parse_str(item["id"].as_str().unwrap()).unwrap());
        }

        pages += 1;
        if body["has_more"].as_bool().unwrap() {
            cursor = Some(body["next_cursor"].as_str().unwrap().to_string());
        } else {
            assert!(body["next_cursor"].is_null());
            break;
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 25);
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(unique.len(), 25, "no id may repeat across pages");

    // Newest-first: reverse insertion order.
    let expected: Vec<Uuid> = created.iter().rev().copied().collect();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn pagination_handles_created_at_ties() {
    let app = app().await;
    let user = app.create_user("notif_ties").await;

    // Five rows sharing one timestamp; ordering falls back to id DESC.
    let stamp = datetime!(2026-02-01 09:00:00 UTC);
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(
            app.seed_notification_at(user.id, &format!("tied {}", i), stamp)
                .await,
        );
    }
    ids.sort();
    ids.reverse();

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let path = match &cursor {
            Some(cursor) => format!("/notifications?limit=2&cursor={}", cursor),
            None => "/notifications?limit=2".to_string(),
        };
        let resp = app.get(&path, Some(&user.access_token)).await;
        assert_eq!(resp.status, StatusCode::OK);
        let body = resp.json();

        for item in body["items"].as_array().unwrap() {
            seen.push(Uuid::parse_str(item["id"].as_str().unwrap()).unwrap());
        }
        if body["has_more"].as_bool().unwrap() {
            cursor = Some(body["next_cursor"].as_str().unwrap().to_string());
        } else {
            break;
        }
    }

    assert_eq!(seen, ids, "ties must resolve by id desc with no skips");
}

#[tokio::test]
async fn list_clamps_limit() {
    let app = app().await;
    let user = app.create_user("notif_clamp").await;

    let resp = app
        .get("/notifications?limit=10000", Some(&user.access_token))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["limit"].as_i64().unwrap(), 100);
}

#[tokio::test]
async fn list_rejects_malformed_cursor() {
    let app = app().await;
    let user = app.create_user("notif_badcursor").await;

    let resp = app
        .get(
            "/notifications?cursor=definitely%20not%20base64",
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "cursor is not valid base64");
}

#[tokio::test]
async fn list_includes_total_count_on_request() {
    let app = app().await;
    let user = app.create_user("notif_count").await;
    let service = app.notification_service();

    for i in 0..3 {
        service
            .create_and_publish(user.id, &format!("counted {}", i), NotificationType::General)
            .await
            .expect("create failed");
    }

    let resp = app
        .get(
            "/notifications?limit=2&include_count=true",
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["total_count"].as_i64().unwrap(), 3);

    let resp = app.get("/notifications?limit=2", Some(&user.access_token)).await;
    assert!(resp.json().get("total_count").is_none());
}

#[tokio::test]
async fn list_requires_auth() {
    let app = app().await;
    let resp = app.get("/notifications", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

// ===========================================================================
// Creation & counts
// ===========================================================================

#[tokio::test]
async fn create_succeeds_with_zero_subscribers() {
    let app = app().await;
    let user = app.create_user("notif_nosub").await;
    let service = app.notification_service();

    let notification = service
        .create_and_publish(user.id, "nobody is listening", NotificationType::General)
        .await
        .expect("create must succeed without subscribers");

    let stored: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE id = $1")
            .bind(notification.id)
            .fetch_one(app.pool())
            .await
            .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn live_subscriber_receives_created_notification() {
    let app = app().await;
    let user = app.create_user("notif_live").await;
    let service = app.notification_service();

    let mut pubsub = app
        .state
        .fanout
        .subscribe_notifications(user.id)
        .await
        .expect("subscribe failed");

    let created = service
        .create_and_publish(user.id, "hello in real time", NotificationType::General)
        .await
        .expect("create failed");

    let mut messages = pubsub.on_message();
    let message = tokio::time::timeout(Duration::from_secs(5), messages.next())
        .await
        .expect("no pub/sub message within deadline")
        .expect("pub/sub stream ended");

    let payload: String = message.get_payload().unwrap();
    let payload: serde_json::Value = serde_json::from_str(&payload).unwrap();

    assert_eq!(payload["event_type"].as_str().unwrap(), "notification");
    assert_eq!(
        payload["id"].as_str().unwrap(),
        created.id.to_string()
    );
    assert_eq!(payload["message"].as_str().unwrap(), "hello in real time");
    assert_eq!(payload["type"].as_str().unwrap(), "general");
}

#[tokio::test]
async fn unread_count_tracks_mutations() {
    let app = app().await;
    let user = app.create_user("notif_unread").await;
    let service = app.notification_service();

    let first = service
        .create_and_publish(user.id, "one", NotificationType::General)
        .await
        .unwrap();
    service
        .create_and_publish(user.id, "two", NotificationType::General)
        .await
        .unwrap();

    let resp = app
        .get("/notifications/unread-count", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["unread_count"].as_i64().unwrap(), 2);

    let resp = app
        .put_json(
            &format!("/notifications/{}/read", first.id),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["updated"].as_bool().unwrap());
    assert_eq!(resp.json()["unread_count"].as_i64().unwrap(), 1);

    // Marking again is an idempotent no-op.
    let resp = app
        .put_json(
            &format!("/notifications/{}/read", first.id),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(!resp.json()["updated"].as_bool().unwrap());
}

#[tokio::test]
async fn mark_all_read_zeroes_count_and_notifies_count_stream() {
    let app = app().await;
    let user = app.create_user("notif_markall").await;
    let service = app.notification_service();

    for i in 0..4 {
        service
            .create_and_publish(user.id, &format!("bulk {}", i), NotificationType::General)
            .await
            .unwrap();
    }

    let mut pubsub = app
        .state
        .fanout
        .subscribe_unread_count(user.id)
        .await
        .expect("subscribe failed");

    let resp = app
        .put_json(
            "/notifications/read-all",
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["marked_read"].as_i64().unwrap(), 4);
    assert_eq!(resp.json()["unread_count"].as_i64().unwrap(), 0);

    let resp = app
        .get("/notifications/unread-count", Some(&user.access_token))
        .await;
    assert_eq!(resp.json()["unread_count"].as_i64().unwrap(), 0);

    // The count channel converges to the same value.
    let mut messages = pubsub.on_message();
    let message = tokio::time::timeout(Duration::from_secs(5), messages.next())
        .await
        .expect("no count update within deadline")
        .expect("pub/sub stream ended");
    let payload: String = message.get_payload().unwrap();
    let payload: serde_json::Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(payload["event_type"].as_str().unwrap(), "unread_count");
    assert_eq!(payload["unread_count"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn delete_notification_republishes_count() {
    let app = app().await;
    let user = app.create_user("notif_delete").await;
    let service = app.notification_service();

    let notification = service
        .create_and_publish(user.id, "to delete", NotificationType::General)
        .await
        .unwrap();

    let resp = app
        .delete(
            &format!("/notifications/{}", notification.id),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app
        .delete(
            &format!("/notifications/{}", notification.id),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .get("/notifications/unread-count", Some(&user.access_token))
        .await;
    assert_eq!(resp.json()["unread_count"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn users_cannot_touch_foreign_notifications() {
    let app = app().await;
    let owner = app.create_user("notif_owner").await;
    let stranger = app.create_user("notif_stranger").await;
    let service = app.notification_service();

    let notification = service
        .create_and_publish(owner.id, "private", NotificationType::General)
        .await
        .unwrap();

    let resp = app
        .delete(
            &format!("/notifications/{}", notification.id),
            Some(&stranger.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = app
        .put_json(
            &format!("/notifications/{}/read", notification.id),
            json!({}),
            Some(&stranger.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(!resp.json()["updated"].as_bool().unwrap());
}

// ===========================================================================
// SSE endpoints
// ===========================================================================

#[tokio::test]
async fn stream_requires_token() {
    let app = app().await;
    let resp = app.get("/notifications/stream", None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stream_rejects_bad_token() {
    let app = app().await;
    let resp = app
        .get("/notifications/stream?token=not-a-real-token", None)
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn stream_emits_connected_baseline() {
    let app = app().await;
    let user = app.create_user("sse_baseline").await;
    let service = app.notification_service();

    service
        .create_and_publish(user.id, "pending read", NotificationType::General)
        .await
        .unwrap();

    let response = app
        .request_raw(
            Method::GET,
            &format!("/notifications/stream?token={}", user.access_token),
            None,
            &[],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|value| value.to_str().ok()),
        Some("no-cache")
    );

    let mut body = response.into_body().into_data_stream();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("no SSE frame within deadline")
        .expect("stream ended")
        .expect("body error");
    let frame = String::from_utf8_lossy(&frame).to_string();

    assert!(frame.contains("event: connected"), "got frame: {}", frame);
    assert!(frame.contains("\"unread_count\":1"), "got frame: {}", frame);
}

#[tokio::test]
async fn stream_forwards_live_notifications() {
    let app = app().await;
    let user = app.create_user("sse_live").await;
    let service = app.notification_service();

    let response = app
        .request_raw(
            Method::GET,
            &format!("/notifications/stream?token={}", user.access_token),
            None,
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body().into_data_stream();

    // Drain the baseline frame first so the subscription is live.
    let first = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("no baseline frame")
        .expect("stream ended")
        .expect("body error");
    assert!(String::from_utf8_lossy(&first).contains("event: connected"));

    service
        .create_and_publish(user.id, "streamed live", NotificationType::PaymentSuccess)
        .await
        .unwrap();

    let mut collected = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout_at(deadline, body.next()).await {
            Ok(Some(Ok(frame))) => {
                collected.push_str(&String::from_utf8_lossy(&frame));
                if collected.contains("event: notification") {
                    break;
                }
            }
            _ => break,
        }
    }

    assert!(
        collected.contains("event: notification"),
        "expected live notification frame, got: {}",
        collected
    );
    assert!(collected.contains("streamed live"));
    assert!(collected.contains("payment_success"));
}

#[tokio::test]
async fn count_stream_emits_baseline_count() {
    let app = app().await;
    let user = app.create_user("sse_count").await;
    let service = app.notification_service();

    service
        .create_and_publish(user.id, "unread one", NotificationType::General)
        .await
        .unwrap();
    service
        .create_and_publish(user.id, "unread two", NotificationType::General)
        .await
        .unwrap();

    let response = app
        .request_raw(
            Method::GET,
            &format!(
                "/notifications/unread-count/stream?token={}",
                user.access_token
            ),
            None,
            &[],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let frame = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("no SSE frame within deadline")
        .expect("stream ended")
        .expect("body error");
    let frame = String::from_utf8_lossy(&frame).to_string();

    assert!(frame.contains("event: count"), "got frame: {}", frame);
    assert!(frame.contains("\"unread_count\":2"), "got frame: {}", frame);
}

#[tokio::test]
async fn stream_accepts_cookie_token() {
    let app = app().await;
    let user = app.create_user("sse_cookie").await;

    let cookie = format!("access_token={}", user.access_token);
    let response = app
        .request_raw(
            Method::GET,
            "/notifications/stream",
            None,
            &[("cookie", cookie.as_str())],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}
