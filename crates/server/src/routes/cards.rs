use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, patch, post},
};
use db::models::card::Card;
use services::services::kanban::{
    CardDetails, CreateCardRequest, MoveCardRequest, UpdateCardRequest,
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::RequestContext, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/kanban/boards/{board_id}/cards", post(create_card))
        .route(
            "/kanban/boards/{board_id}/cards/{card_id}",
            get(get_card).put(update_card).delete(delete_card),
        )
        .route(
            "/kanban/boards/{board_id}/cards/{card_id}/move",
            patch(move_card),
        )
}

/// POST /api/kanban/boards/{board_id}/cards - Appends to the end of its column
pub async fn create_card(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
    Json(payload): Json<CreateCardRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Card>>), ApiError> {
    let card = state
        .kanban()
        .create_card(board_id, ctx.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(card))))
}

pub async fn get_card(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<CardDetails>>, ApiError> {
    let card = state
        .kanban()
        .get_card(board_id, card_id, ctx.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(card)))
}

/// PUT /api/kanban/boards/{board_id}/cards/{card_id} - Content only, never status or position
pub async fn update_card(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateCardRequest>,
) -> Result<ResponseJson<ApiResponse<Card>>, ApiError> {
    let card = state
        .kanban()
        .update_card(board_id, card_id, ctx.user_id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(card)))
}

/// PATCH /api/kanban/boards/{board_id}/cards/{card_id}/move
pub async fn move_card(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<MoveCardRequest>,
) -> Result<ResponseJson<ApiResponse<Card>>, ApiError> {
    let card = state
        .kanban()
        .move_card(board_id, card_id, ctx.user_id, payload)
        .await?;
    Ok(ResponseJson(ApiResponse::success(card)))
}

pub async fn delete_card(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state
        .kanban()
        .delete_card(board_id, card_id, ctx.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(())))
}
