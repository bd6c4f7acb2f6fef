use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::board::{Board, BoardSummary, CreateBoard};
use services::services::kanban::BoardDetails;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, auth::RequestContext, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/kanban/boards", post(create_board))
        .route("/kanban/boards/my", get(list_my_boards))
        .route("/kanban/teams/{team_id}/boards", get(list_team_boards))
        .route(
            "/kanban/boards/{board_id}",
            get(get_board).delete(delete_board),
        )
}

/// POST /api/kanban/boards
pub async fn create_board(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(payload): Json<CreateBoard>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Board>>), ApiError> {
    let board = state.kanban().create_board(ctx.user_id, payload).await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(board))))
}

/// GET /api/kanban/boards/my - Boards of every team the caller belongs to
pub async fn list_my_boards(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<ResponseJson<ApiResponse<Vec<BoardSummary>>>, ApiError> {
    let boards = state.kanban().list_my_boards(ctx.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(boards)))
}

/// GET /api/kanban/teams/{team_id}/boards
pub async fn list_team_boards(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(team_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<BoardSummary>>>, ApiError> {
    let boards = state
        .kanban()
        .list_team_boards(team_id, ctx.user_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(boards)))
}

/// GET /api/kanban/boards/{board_id} - Board with cards, checklists and comment counts
pub async fn get_board(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<BoardDetails>>, ApiError> {
    let board = state.kanban().get_board(board_id, ctx.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

/// DELETE /api/kanban/boards/{board_id} - Owners and admins only
pub async fn delete_board(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(board_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    state.kanban().delete_board(board_id, ctx.user_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}
