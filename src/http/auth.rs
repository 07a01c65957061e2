use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::app::auth::AuthService;
use crate::http::AppError;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
}

/// Authentication for SSE endpoints. Browsers cannot set headers on
/// EventSource connections, so the token arrives as a `token` query
/// parameter or an `access_token` cookie; the query parameter wins.
#[derive(Debug, Clone)]
pub struct StreamAuthUser {
    pub user_id: uuid::Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

        let user_id = authenticate(state, token).await?;
        Ok(AuthUser { user_id })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for StreamAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_query(parts)
            .or_else(|| token_from_cookie(parts))
            .ok_or_else(|| AppError::unauthorized("missing stream token"))?;

        let user_id = authenticate(state, &token).await?;
        Ok(StreamAuthUser { user_id })
    }
}

async fn authenticate(state: &AppState, token: &str) -> Result<uuid::Uuid, AppError> {
    let service = AuthService::from_state(state);
    let session = service
        .authenticate_access_token(token)
        .await
        .map_err(|_| AppError::internal("failed to authenticate"))?;

    let session = session.ok_or_else(|| AppError::unauthorized("invalid token"))?;
    Ok(session.user_id)
}

fn token_from_query(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
}

fn token_from_cookie(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(header::COOKIE)?.to_str().ok()?;
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "access_token")
        .map(|(_, value)| value.to_string())
}
