use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::card_comment::CardComment;
use services::services::kanban::CreateCommentRequest;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::RequestContext, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/kanban/boards/{board_id}/cards/{card_id}/comments",
        get(list_comments).post(add_comment),
    )
}

/// GET .../comments - Oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<Vec<CardComment>>>, ApiError> {
    let comments = state
        .kanban()
        .list_comments(board_id, card_id, ctx.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(comments)))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path((board_id, card_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<CardComment>>), ApiError> {
    let comment = state
        .kanban()
        .add_comment(board_id, card_id, ctx.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(comment))))
}
