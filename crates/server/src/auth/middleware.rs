use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::AppState;

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: Uuid,
    pub access_token_expires_at: DateTime<Utc>,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(token)| token.token().to_owned())
}

pub async fn require_user(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(req.headers()) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let identity = match state.jwt().decode_access_token(&token) {
        Ok(details) => details,
        Err(error) => {
            warn!(?error, "failed to decode access token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    req.extensions_mut().insert(RequestContext {
        user_id: identity.user_id,
        access_token_expires_at: identity.expires_at,
    });

    next.run(req).await
}
