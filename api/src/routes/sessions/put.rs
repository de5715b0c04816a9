use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use util::state::AppState;

use crate::response::ApiResponse;

use super::common::{EditSessionReq, SessionResponse};
use db::models::session;

/// PUT `/api/sessions/{session_id}`
///
/// Edit a session. When the time window changes, `expected_minutes` is
/// recomputed; it can never be set directly.
///
/// **Auth**: instructor.
pub async fn edit_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Json(body): Json<EditSessionReq>,
) -> (StatusCode, Json<ApiResponse<Option<SessionResponse>>>) {
    let db = state.db();

    let existing = match session::Model::find_by_id(db, session_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Session not found")),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to load session");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving session")),
            );
        }
    };

    if let Some(title) = body.title.as_deref() {
        if title.trim().is_empty() {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error("title must not be empty")),
            );
        }
    }
    let new_start = body.start_ts.unwrap_or(existing.start_ts);
    let new_end = body.end_ts.unwrap_or(existing.end_ts);
    if new_end <= new_start {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("end_ts must be after start_ts")),
        );
    }

    match existing
        .apply_edit(
            db,
            body.title.as_deref(),
            body.session_type.as_deref(),
            body.start_ts,
            body.end_ts,
            body.location.map(Some),
            body.description.map(Some),
            body.mandatory,
        )
        .await
    {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(SessionResponse::from(updated)),
                "Session updated",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to update session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to update session")),
            )
        }
    }
}
