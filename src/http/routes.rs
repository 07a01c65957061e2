use axum::{routing::delete, routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::http::sse;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/revoke", post(handlers::revoke_token))
        .route("/auth/me", get(handlers::get_current_user))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .route("/auth/reset-password", post(handlers::reset_password))
        .route("/auth/change-password", post(handlers::change_password))
}

pub fn bookings() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(handlers::create_booking))
        .route("/bookings", get(handlers::list_bookings))
        .route("/bookings/:id", get(handlers::get_booking))
        .route("/bookings/:id/cancel", post(handlers::cancel_booking))
        .route("/bookings/:id/ticket", post(handlers::upload_ticket))
}

pub fn payments() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(handlers::payment_webhook))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/unread-count",
            get(handlers::unread_count),
        )
        .route(
            "/notifications/:id/read",
            put(handlers::mark_notification_read),
        )
        .route(
            "/notifications/read-all",
            put(handlers::mark_all_notifications_read),
        )
        .route("/notifications/:id", delete(handlers::delete_notification))
        .route("/notifications/stream", get(sse::notification_stream))
        .route(
            "/notifications/unread-count/stream",
            get(sse::unread_count_stream),
        )
}
