//! Booking, payment webhook, and ticket upload tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Booking CRUD
// ===========================================================================

#[tokio::test]
async fn create_booking_valid() {
    let app = app().await;
    let user = app.create_user("bk_create").await;

    let resp = app
        .post_json(
            "/bookings",
            json!({ "amount_cents": 250000, "currency": "usd" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["user_id"].as_str().unwrap(), user.id.to_string());
    assert_eq!(body["status"].as_str().unwrap(), "pending");
    assert_eq!(body["currency"].as_str().unwrap(), "USD");
    assert_eq!(body["pnr"].as_str().unwrap().len(), 6);
}

#[tokio::test]
async fn create_booking_rejects_bad_amount() {
    let app = app().await;
    let user = app.create_user("bk_badamount").await;

    let resp = app
        .post_json(
            "/bookings",
            json!({ "amount_cents": 0 }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "amount_cents must be positive");
}

#[tokio::test]
async fn get_booking_scoped_to_owner() {
    let app = app().await;
    let owner = app.create_user("bk_owner").await;
    let stranger = app.create_user("bk_stranger").await;
    let (booking_id, _) = app.create_booking(owner.id).await;

    let resp = app
        .get(&format!("/bookings/{}", booking_id), Some(&owner.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app
        .get(
            &format!("/bookings/{}", booking_id),
            Some(&stranger.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_bookings_returns_own_rows() {
    let app = app().await;
    let user = app.create_user("bk_list").await;
    app.create_booking(user.id).await;
    app.create_booking(user.id).await;

    let resp = app.get("/bookings", Some(&user.access_token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn cancel_booking_once() {
    let app = app().await;
    let user = app.create_user("bk_cancel").await;
    let (booking_id, _) = app.create_booking(user.id).await;

    let resp = app
        .post_json(
            &format!("/bookings/{}/cancel", booking_id),
            json!({ "reason": "change of plans" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"].as_str().unwrap(), "cancelled");

    let resp = app
        .post_json(
            &format!("/bookings/{}/cancel", booking_id),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Payment webhook
// ===========================================================================

#[tokio::test]
async fn payment_webhook_marks_booking_paid() {
    let app = app().await;
    let user = app.create_user("bk_pay").await;
    let (booking_id, _) = app.create_booking(user.id).await;

    let resp = app
        .post_json(
            "/payments/webhook",
            json!({ "booking_id": booking_id, "status": "success" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let status: String = sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(status, "paid");
}

#[tokio::test]
async fn payment_webhook_records_failure_then_allows_retry() {
    let app = app().await;
    let user = app.create_user("bk_payfail").await;
    let (booking_id, _) = app.create_booking(user.id).await;

    let resp = app
        .post_json(
            "/payments/webhook",
            json!({ "booking_id": booking_id, "status": "failed", "reason": "card declined" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let status: String = sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(status, "payment_failed");

    // A later successful attempt still lands.
    let resp = app
        .post_json(
            "/payments/webhook",
            json!({ "booking_id": booking_id, "status": "success" }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn payment_webhook_rejects_unknown_status() {
    let app = app().await;

    let resp = app
        .post_json(
            "/payments/webhook",
            json!({ "booking_id": Uuid::new_v4(), "status": "maybe" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn payment_webhook_unknown_booking_is_404() {
    let app = app().await;

    let resp = app
        .post_json(
            "/payments/webhook",
            json!({ "booking_id": Uuid::new_v4(), "status": "success" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Ticket upload
// ===========================================================================

#[tokio::test]
async fn upload_ticket_requires_admin() {
    let app = app().await;
    let user = app.create_user("bk_ticket_user").await;
    let (booking_id, _) = app.create_booking(user.id).await;

    let resp = app
        .post_json(
            &format!("/bookings/{}/ticket", booking_id),
            json!({ "ticket_url": "https://tickets.example.com/t/1.pdf" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "admin role required");
}

#[tokio::test]
async fn upload_ticket_as_admin() {
    let app = app().await;
    let user = app.create_user("bk_ticket_owner").await;
    let admin = app.create_admin("bk_ticket_admin").await;
    let (booking_id, _) = app.create_booking(user.id).await;

    let resp = app
        .post_json(
            &format!("/bookings/{}/ticket", booking_id),
            json!({ "ticket_url": "https://tickets.example.com/t/2.pdf" }),
            Some(&admin.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.json()["ticket_url"].as_str().unwrap(),
        "https://tickets.example.com/t/2.pdf"
    );
}
