use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use util::state::AppState;

use crate::auth::guards::Empty;
use crate::response::ApiResponse;

use db::models::{checkin_token, session};

/// DELETE `/api/sessions/{session_id}`
///
/// Delete a session. Its attendance records and check-in tokens go with it
/// via foreign key cascade.
///
/// **Auth**: instructor.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<Empty>>) {
    let db = state.db();

    match session::Model::delete_by_id(db, session_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ApiResponse::success(Empty, "Session deleted")),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Session not found")),
        ),
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to delete session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete session")),
            )
        }
    }
}

/// DELETE `/api/sessions/{session_id}/checkin`
///
/// Revoke check-in for a session by deactivating all its tokens.
/// Idempotent: revoking with nothing active still succeeds.
///
/// **Auth**: instructor.
pub async fn revoke_checkin(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<Empty>>) {
    let db = state.db();

    if session::Model::find_by_id(db, session_id)
        .await
        .ok()
        .flatten()
        .is_none()
    {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Session not found")),
        );
    }

    match checkin_token::Model::deactivate_all(db, session_id).await {
        Ok(_) => (
            StatusCode::OK,
            Json(ApiResponse::success(Empty, "Check-in revoked")),
        ),
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to revoke check-in tokens");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to revoke check-in")),
            )
        }
    }
}
