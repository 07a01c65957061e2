use async_stream::stream;
use axum::extract::State;
use axum::http::header::{HeaderName, CACHE_CONTROL};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use futures::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::app::notifications::NotificationService;
use crate::http::auth::StreamAuthUser;
use crate::http::AppError;
use crate::infra::fanout::NotificationFanout;
use crate::AppState;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// `GET /notifications/stream` — long-lived stream of the caller's
/// notification channel. Emits a `connected` baseline event carrying the
/// current unread count before any live message, so the client has state it
/// can trust even if a publish races the subscription.
pub async fn notification_stream(
    auth: StreamAuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let initial_count = baseline_unread_count(&state, auth.user_id).await?;
    let stream = notification_event_stream(state.fanout.clone(), auth.user_id, initial_count);
    Ok(sse_response(stream))
}

/// `GET /notifications/unread-count/stream` — lightweight stream carrying
/// only unread-count updates, for badge rendering.
pub async fn unread_count_stream(
    auth: StreamAuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let initial_count = baseline_unread_count(&state, auth.user_id).await?;
    let stream = count_event_stream(state.fanout.clone(), auth.user_id, initial_count);
    Ok(sse_response(stream))
}

async fn baseline_unread_count(state: &AppState, user_id: Uuid) -> Result<i64, AppError> {
    let notifications = NotificationService::new(state.db.clone(), state.fanout.clone());
    notifications.unread_count(user_id).await.map_err(|err| {
        error!(error = ?err, %user_id, "failed to load unread count for stream");
        AppError::internal("failed to load unread count")
    })
}

fn sse_response<S>(stream: S) -> impl IntoResponse
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    (
        [
            (CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream),
    )
}

fn notification_event_stream(
    fanout: NotificationFanout,
    user_id: Uuid,
    initial_count: i64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream! {
        // Dropping the pub/sub connection (client disconnect included)
        // releases the subscription; it is dedicated to this stream.
        let mut pubsub = match fanout.subscribe_notifications(user_id).await {
            Ok(pubsub) => pubsub,
            Err(err) => {
                warn!(error = ?err, %user_id, "failed to subscribe notification stream");
                yield Ok(stream_error_event());
                return;
            }
        };
        info!(%user_id, "notification stream established");

        yield Ok(Event::default().event("connected").data(
            json!({
                "status": "connected",
                "user_id": user_id,
                "unread_count": initial_count,
            })
            .to_string(),
        ));

        let mut messages = pubsub.on_message();
        loop {
            match timeout(HEARTBEAT_INTERVAL, messages.next()).await {
                Ok(Some(message)) => {
                    let payload: String = match message.get_payload() {
                        Ok(payload) => payload,
                        Err(err) => {
                            warn!(error = ?err, %user_id, "unreadable pub/sub payload");
                            continue;
                        }
                    };
                    yield Ok(Event::default()
                        .event(payload_event_type(&payload))
                        .data(payload));
                }
                Ok(None) => {
                    warn!(%user_id, "notification stream pub/sub connection closed");
                    yield Ok(stream_error_event());
                    break;
                }
                Err(_) => {
                    // No message within the interval; keep intermediaries
                    // from dropping the idle connection.
                    yield Ok(Event::default().comment("heartbeat"));
                }
            }
        }
    }
}

fn count_event_stream(
    fanout: NotificationFanout,
    user_id: Uuid,
    initial_count: i64,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream! {
        let mut pubsub = match fanout.subscribe_unread_count(user_id).await {
            Ok(pubsub) => pubsub,
            Err(err) => {
                warn!(error = ?err, %user_id, "failed to subscribe unread count stream");
                yield Ok(stream_error_event());
                return;
            }
        };
        info!(%user_id, "unread count stream established");

        yield Ok(Event::default()
            .event("count")
            .data(json!({ "unread_count": initial_count }).to_string()));

        let mut messages = pubsub.on_message();
        loop {
            match timeout(HEARTBEAT_INTERVAL, messages.next()).await {
                Ok(Some(message)) => {
                    let payload: String = match message.get_payload() {
                        Ok(payload) => payload,
                        Err(err) => {
                            warn!(error = ?err, %user_id, "unreadable pub/sub payload");
                            continue;
                        }
                    };
                    yield Ok(Event::default().event("count").data(payload));
                }
                Ok(None) => {
                    warn!(%user_id, "unread count stream pub/sub connection closed");
                    yield Ok(stream_error_event());
                    break;
                }
                Err(_) => {
                    yield Ok(Event::default().comment("heartbeat"));
                }
            }
        }
    }
}

fn payload_event_type(payload: &str) -> String {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|value| {
            value
                .get("event_type")
                .and_then(|event_type| event_type.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "notification".to_string())
}

fn stream_error_event() -> Event {
    Event::default()
        .event("error")
        .data(json!({ "error": "stream_error" }).to_string())
}
