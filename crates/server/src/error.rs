use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use services::services::{kanban::KanbanError, session_tracker::SessionError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Kanban(#[from] KanbanError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("unauthorized")]
    Unauthorized,
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Kanban(err) => match err {
                KanbanError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                KanbanError::PermissionDenied(_) => (StatusCode::FORBIDDEN, err.to_string()),
                KanbanError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                KanbanError::InvariantViolation => (StatusCode::CONFLICT, err.to_string()),
                KanbanError::TransientStoreFailure(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
                }
                KanbanError::Database(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                ),
            },
            ApiError::Session(_) | ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(ApiResponse::<()>::error(&message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kanban_errors_map_to_status_codes() {
        let cases = [
            (KanbanError::NotFound("card"), StatusCode::NOT_FOUND),
            (KanbanError::PermissionDenied("no"), StatusCode::FORBIDDEN),
            (
                KanbanError::Validation("title is required".into()),
                StatusCode::BAD_REQUEST,
            ),
            (KanbanError::InvariantViolation, StatusCode::CONFLICT),
            (
                KanbanError::TransientStoreFailure(sqlx::Error::PoolTimedOut),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                KanbanError::Database(sqlx::Error::RowNotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_store_details_are_not_leaked() {
        let (_, message) =
            ApiError::Database(sqlx::Error::Protocol("disk I/O at page 7".into()))
                .status_and_message();
        assert_eq!(message, "internal server error");
    }
}
