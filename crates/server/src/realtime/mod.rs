//! WebSocket endpoint for collaborative editing and live board updates.

use axum::{
    Router,
    extract::{Query, State, ws::WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::{AppState, auth::bearer_token, error::ApiError};

pub mod message;
mod session;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(upgrade))
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Authenticate before upgrading; the bearer header wins over `?token=`.
async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
) -> Response {
    let Some(token) = bearer_token(&headers).or(query.token) else {
        return ApiError::Unauthorized.into_response();
    };

    let identity = match state.jwt().decode_access_token(&token) {
        Ok(identity) => identity,
        Err(error) => {
            tracing::warn!(?error, "rejected websocket token");
            return ApiError::Unauthorized.into_response();
        }
    };

    let user_id = identity.user_id;
    ws.on_upgrade(move |socket| session::handle(socket, state, user_id))
}
