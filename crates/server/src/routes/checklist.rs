use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, patch, post},
};
use services::services::kanban::{CardDetails, CreateChecklistItemRequest};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::RequestContext, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/kanban/boards/{board_id}/cards/{card_id}/checklist",
            post(add_item),
        )
        .route(
            "/kanban/boards/{board_id}/cards/{card_id}/checklist/{item_id}/toggle",
            patch(toggle_item),
        )
        .route(
            "/kanban/boards/{board_id}/cards/{card_id}/checklist/{item_id}",
            delete(delete_item),
        )
}

// Every checklist endpoint answers with the whole card so the client can
// redraw it in one go.

pub async fn add_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateChecklistItemRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<CardDetails>>), ApiError> {
    let card = state
        .kanban()
        .add_checklist_item(board_id, card_id, ctx.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(card))))
}

pub async fn toggle_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, card_id, item_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<CardDetails>>, ApiError> {
    let card = state
        .kanban()
        .toggle_checklist_item(board_id, card_id, item_id, ctx.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(card)))
}

pub async fn delete_item(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, card_id, item_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<CardDetails>>, ApiError> {
    let card = state
        .kanban()
        .delete_checklist_item(board_id, card_id, item_id, ctx.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(card)))
}
