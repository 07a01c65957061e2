use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;
mod sse;

pub use auth::{AuthUser, StreamAuthUser};
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::bookings())
        .merge(routes::payments())
        .merge(routes::notifications())
        .with_state(state)
}
