use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::AuthService;
use crate::app::bookings::BookingService;
use crate::app::notifications::NotificationService;
use crate::app::payments::PaymentService;
use crate::app::tickets::TicketService;
use crate::app::users::UserService;
use crate::domain::booking::Booking;
use crate::domain::notification::Notification;
use crate::events::{topics, BookingEvent, PaymentEvent, TicketEvent, UserEvent};
use crate::http::{AppError, AuthUser};
use crate::pagination::{clamp_limit, PageCursor};
use crate::AppState;

const MAX_PASSWORD_LEN: usize = 128;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

/// Best-effort event emission from producing code paths. The durable row is
/// the source of truth; a broker outage degrades notifications, not the
/// request.
async fn publish_event<T: serde::Serialize>(state: &AppState, topic: &str, event: &T) {
    if let Err(err) = state.producer.publish(topic, event).await {
        tracing::warn!(error = ?err, topic, "failed to publish event");
    }
}

// ===========================================================================
// Auth
// ===========================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<crate::domain::user::User>, AppError> {
    let email = payload.email.trim().to_lowercase();
    let full_name = payload.full_name.trim().to_string();

    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email is required"));
    }
    if full_name.is_empty() {
        return Err(AppError::bad_request("full_name is required"));
    }
    validate_password(&payload.password)?;

    let service = AuthService::from_state(&state);
    let user = service
        .register(&email, &full_name, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register")
        })?;

    let user = user.ok_or_else(|| AppError::conflict("email already registered"))?;

    publish_event(
        &state,
        topics::USER_EVENTS,
        &UserEvent::UserRegistered {
            user_id: user.id,
            email: user.email.clone(),
        },
    )
    .await;

    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = AuthService::from_state(&state);
    let tokens = service
        .login(payload.email.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = AuthService::from_state(&state);
    let tokens = service.refresh(&payload.refresh_token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to refresh token");
        AppError::internal("failed to refresh token")
    })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

#[derive(Deserialize)]
pub struct RevokeRequest {
    pub refresh_token: String,
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RevokeRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = AuthService::from_state(&state);
    service
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<crate::domain::user::User>, AppError> {
    let service = AuthService::from_state(&state);
    let user = service.get_current_user(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
        AppError::internal("failed to fetch current user")
    })?;

    user.map(Json)
        .ok_or_else(|| AppError::not_found("user not found"))
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::bad_request("email is required"));
    }

    let service = AuthService::from_state(&state);
    let issued = service
        .create_password_reset_token(&email)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create reset token");
            AppError::internal("failed to process request")
        })?;

    if let Some((user, reset_token)) = issued {
        publish_event(
            &state,
            topics::USER_EVENTS,
            &UserEvent::PasswordResetRequested {
                email: user.email,
                reset_token,
            },
        )
        .await;
    }

    // Identical response whether or not the account exists.
    Ok(Json(MessageResponse {
        message: "If the account exists, a reset email has been sent".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if payload.token.trim().is_empty() {
        return Err(AppError::bad_request("token is required"));
    }
    validate_password(&payload.new_password)?;

    let service = AuthService::from_state(&state);
    let user = service
        .reset_password(payload.token.trim(), &payload.new_password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to reset password");
            AppError::internal("failed to reset password")
        })?;

    let user = user.ok_or_else(|| AppError::bad_request("invalid or expired reset token"))?;

    publish_event(
        &state,
        topics::USER_EVENTS,
        &UserEvent::PasswordChanged {
            user_id: user.id,
            email: user.email,
        },
    )
    .await;

    Ok(Json(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    validate_password(&payload.new_password)?;

    let service = AuthService::from_state(&state);
    let user = service
        .change_password(auth.user_id, &payload.current_password, &payload.new_password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to change password");
            AppError::internal("failed to change password")
        })?;

    let user = user.ok_or_else(|| AppError::bad_request("current password is incorrect"))?;

    publish_event(
        &state,
        topics::USER_EVENTS,
        &UserEvent::PasswordChanged {
            user_id: user.id,
            email: user.email,
        },
    )
    .await;

    Ok(Json(MessageResponse {
        message: "Password has been changed".to_string(),
    }))
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }
    Ok(())
}

// ===========================================================================
// Bookings
// ===========================================================================

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub amount_cents: i64,
    pub currency: Option<String>,
}

pub async fn create_booking(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    if payload.amount_cents <= 0 {
        return Err(AppError::bad_request("amount_cents must be positive"));
    }
    let currency = payload.currency.unwrap_or_else(|| "USD".to_string());
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::bad_request("currency must be a 3-letter code"));
    }

    let user = UserService::new(state.db.clone())
        .get_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to load user");
            AppError::internal("failed to create booking")
        })?
        .ok_or_else(|| AppError::unauthorized("unknown user"))?;

    let service = BookingService::new(state.db.clone());
    let booking = service
        .create(auth.user_id, payload.amount_cents, &currency.to_uppercase())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create booking");
            AppError::internal("failed to create booking")
        })?;

    publish_event(
        &state,
        topics::BOOKING_EVENTS,
        &BookingEvent::BookingCreated {
            booking_id: booking.id,
            user_id: Some(booking.user_id),
            user_email: user.email,
            pnr: booking.pnr.clone(),
        },
    )
    .await;

    Ok(Json(booking))
}

#[derive(Serialize)]
pub struct BookingListResponse {
    pub items: Vec<Booking>,
}

pub async fn list_bookings(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<BookingListResponse>, AppError> {
    let service = BookingService::new(state.db.clone());
    let items = service.list(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list bookings");
        AppError::internal("failed to list bookings")
    })?;

    Ok(Json(BookingListResponse { items }))
}

pub async fn get_booking(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let service = BookingService::new(state.db.clone());
    let booking = service
        .get(booking_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, %booking_id, "failed to fetch booking");
            AppError::internal("failed to fetch booking")
        })?;

    booking
        .map(Json)
        .ok_or_else(|| AppError::not_found("booking not found"))
}

#[derive(Deserialize)]
pub struct CancelBookingRequest {
    pub reason: Option<String>,
}

pub async fn cancel_booking(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<CancelBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    let user = UserService::new(state.db.clone())
        .get_user(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to load user");
            AppError::internal("failed to cancel booking")
        })?
        .ok_or_else(|| AppError::unauthorized("unknown user"))?;

    let service = BookingService::new(state.db.clone());
    let booking = service
        .cancel(booking_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, %booking_id, "failed to cancel booking");
            AppError::internal("failed to cancel booking")
        })?
        .ok_or_else(|| AppError::not_found("booking not found or already cancelled"))?;

    publish_event(
        &state,
        topics::BOOKING_EVENTS,
        &BookingEvent::BookingCancelled {
            booking_id: booking.id,
            user_id: Some(booking.user_id),
            user_email: user.email,
            pnr: booking.pnr.clone(),
            reason: payload.reason,
        },
    )
    .await;

    Ok(Json(booking))
}

#[derive(Deserialize)]
pub struct UploadTicketRequest {
    pub ticket_url: String,
}

pub async fn upload_ticket(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(payload): Json<UploadTicketRequest>,
) -> Result<Json<Booking>, AppError> {
    let ticket_url = payload.ticket_url.trim();
    if ticket_url.is_empty() {
        return Err(AppError::bad_request("ticket_url is required"));
    }

    let users = UserService::new(state.db.clone());
    let is_admin = users.is_admin(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to check admin role");
        AppError::internal("failed to upload ticket")
    })?;
    if !is_admin {
        return Err(AppError::forbidden("admin role required"));
    }

    let service = TicketService::new(state.db.clone());
    let booking = service
        .attach_ticket(booking_id, ticket_url)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, %booking_id, "failed to attach ticket");
            AppError::internal("failed to upload ticket")
        })?
        .ok_or_else(|| AppError::not_found("booking not found"))?;

    let owner = users.get_user(booking.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to load booking owner");
        AppError::internal("failed to upload ticket")
    })?;

    publish_event(
        &state,
        topics::TICKET_EVENTS,
        &TicketEvent::TicketUploaded {
            booking_id: booking.id,
            user_id: Some(booking.user_id),
            user_email: owner.map(|owner| owner.email),
            pnr: booking.pnr.clone(),
        },
    )
    .await;

    Ok(Json(booking))
}

// ===========================================================================
// Payments
// ===========================================================================

#[derive(Deserialize)]
pub struct PaymentWebhookRequest {
    pub booking_id: Uuid,
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct PaymentWebhookResponse {
    pub status: &'static str,
}

/// Gateway IPN callback. The booking row is updated first; the event fan-out
/// to email and in-app notifications happens asynchronously.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PaymentWebhookRequest>,
) -> Result<Json<PaymentWebhookResponse>, AppError> {
    let success = match payload.status.as_str() {
        "success" => true,
        "failed" => false,
        _ => return Err(AppError::bad_request("status must be success or failed")),
    };

    let service = PaymentService::new(state.db.clone());
    let booking = service
        .record_outcome(payload.booking_id, success)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, booking_id = %payload.booking_id, "failed to record payment outcome");
            AppError::internal("failed to process payment callback")
        })?
        .ok_or_else(|| AppError::not_found("booking not found or not payable"))?;

    let owner = UserService::new(state.db.clone())
        .get_user(booking.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to load booking owner");
            AppError::internal("failed to process payment callback")
        })?;

    let event = if success {
        PaymentEvent::PaymentSuccessful {
            booking_id: booking.id,
            user_id: Some(booking.user_id),
            user_email: owner.map(|owner| owner.email),
            pnr: booking.pnr.clone(),
        }
    } else {
        PaymentEvent::PaymentFailed {
            booking_id: booking.id,
            user_id: Some(booking.user_id),
            pnr: booking.pnr.clone(),
            reason: payload
                .reason
                .unwrap_or_else(|| "Unknown error".to_string()),
        }
    };
    publish_event(&state, topics::PAYMENT_EVENTS, &event).await;

    Ok(Json(PaymentWebhookResponse { status: "processed" }))
}

// ===========================================================================
// Notifications
// ===========================================================================

#[derive(Deserialize)]
pub struct NotificationListQuery {
    pub cursor: Option<String>,
    pub limit: Option<i64>,
    pub include_count: Option<bool>,
}

#[derive(Serialize)]
pub struct NotificationListResponse {
    pub items: Vec<Notification>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub has_previous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
    pub limit: i64,
}

pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<NotificationListResponse>, AppError> {
    let cursor = match query.cursor.as_deref() {
        Some(raw) => Some(
            PageCursor::decode(raw).map_err(|err| AppError::bad_request(err.to_string()))?,
        ),
        None => None,
    };
    let limit = clamp_limit(query.limit);

    let service = NotificationService::new(state.db.clone(), state.fanout.clone());
    let page = service
        .list(
            auth.user_id,
            cursor,
            limit,
            query.include_count.unwrap_or(false),
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list notifications");
            AppError::internal("failed to list notifications")
        })?;

    Ok(Json(NotificationListResponse {
        items: page.items,
        next_cursor: page.next_cursor,
        has_more: page.has_more,
        has_previous: page.has_previous,
        total_count: page.total_count,
        limit: page.limit,
    }))
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

pub async fn unread_count(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let service = NotificationService::new(state.db.clone(), state.fanout.clone());
    let unread_count = service.unread_count(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to count notifications");
        AppError::internal("failed to count notifications")
    })?;

    Ok(Json(UnreadCountResponse { unread_count }))
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub updated: bool,
    pub unread_count: i64,
}

pub async fn mark_notification_read(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, AppError> {
    let service = NotificationService::new(state.db.clone(), state.fanout.clone());
    let updated = service
        .mark_read(notification_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, %notification_id, "failed to mark notification read");
            AppError::internal("failed to mark notification read")
        })?;

    let unread_count = service.unread_count(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to count notifications");
        AppError::internal("failed to mark notification read")
    })?;

    Ok(Json(MarkReadResponse {
        updated,
        unread_count,
    }))
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub marked_read: i64,
    pub unread_count: i64,
}

pub async fn mark_all_notifications_read(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let service = NotificationService::new(state.db.clone(), state.fanout.clone());
    let marked_read = service.mark_all_read(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to mark all notifications read");
        AppError::internal("failed to mark notifications read")
    })?;

    Ok(Json(MarkAllReadResponse {
        marked_read,
        unread_count: 0,
    }))
}

pub async fn delete_notification(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = NotificationService::new(state.db.clone(), state.fanout.clone());
    let deleted = service
        .delete(notification_id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, %notification_id, "failed to delete notification");
            AppError::internal("failed to delete notification")
        })?;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("notification not found"))
    }
}
