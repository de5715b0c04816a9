use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use util::state::AppState;

use crate::auth::guards::Empty;
use crate::response::ApiResponse;

use db::models::attendance_record;

/// DELETE `/api/attendance/{record_id}`
///
/// Remove a single attendance record.
///
/// **Auth**: instructor.
pub async fn delete_record(
    State(state): State<AppState>,
    Path(record_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<Empty>>) {
    let db = state.db();

    match attendance_record::Model::delete_by_id(db, record_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ApiResponse::success(Empty, "Attendance record deleted")),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Attendance record not found")),
        ),
        Err(e) => {
            tracing::error!(error = %e, record_id, "failed to delete attendance record");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to delete attendance record")),
            )
        }
    }
}
