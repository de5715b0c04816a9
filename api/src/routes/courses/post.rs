use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use util::state::AppState;
use validator::Validate;

use crate::{auth::AuthUser, response::ApiResponse, routes::sessions::SessionResponse, services};

use super::common::{CreateSessionReq, SyncResponse};
use db::models::{course, session};

/// POST `/api/courses/{lms_course_id}/sessions`
///
/// Create a session. `expected_minutes` is derived from the window.
///
/// **Auth**: instructor.
pub async fn create_session(
    State(state): State<AppState>,
    Path(lms_course_id): Path<String>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<CreateSessionReq>,
) -> (StatusCode, Json<ApiResponse<Option<SessionResponse>>>) {
    let db = state.db();

    if let Err(e) = body.validate() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::error(e.to_string())),
        );
    }
    if body.end_ts <= body.start_ts {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("end_ts must be after start_ts")),
        );
    }

    let course = match course::Model::get_or_create(db, &lms_course_id, None).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "failed to resolve course");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error resolving course")),
            );
        }
    };

    match session::Model::create(
        db,
        course.id,
        claims.sub,
        body.title.trim(),
        body.session_type.as_deref().unwrap_or("regular"),
        body.start_ts,
        body.end_ts,
        body.location.as_deref(),
        body.description.as_deref(),
        body.mandatory.unwrap_or(true),
    )
    .await
    {
        Ok(row) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                Some(SessionResponse::from(row)),
                "Session created",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "failed to create session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to create session")),
            )
        }
    }
}

/// POST `/api/courses/{lms_course_id}/roster/sync`
///
/// Pull the course enrollments from the LMS and upsert the roster.
/// Reports the number of entries written; zero when no API token is
/// configured.
///
/// **Auth**: instructor.
pub async fn sync_roster(
    State(state): State<AppState>,
    Path(lms_course_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<SyncResponse>>) {
    let db = state.db();

    if let Err(e) = course::Model::get_or_create(db, &lms_course_id, None).await {
        tracing::error!(error = %e, lms_course_id, "failed to resolve course");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Database error resolving course")),
        );
    }

    match services::roster::sync_course_roster(db, &lms_course_id).await {
        Ok(synced) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                SyncResponse { synced },
                format!("Synced {synced} roster entries"),
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "roster sync failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Roster sync failed")),
            )
        }
    }
}
