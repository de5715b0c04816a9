use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use util::state::AppState;
use validator::Validate;

use crate::response::ApiResponse;

use super::common::{
    CODE_NOT_REGISTERED, CODE_TOKEN_EXPIRED, CODE_TOKEN_INVALID, SubmitCheckinReq,
    SubmitCheckinResponse,
};
use db::models::attendance_record::CheckinOutcome;
use db::models::{attendance_record, checkin_token, session, user};

fn fail(
    status: StatusCode,
    code: &'static str,
    message: &str,
) -> (StatusCode, Json<ApiResponse<SubmitCheckinResponse>>) {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: SubmitCheckinResponse::failure(code),
            message: message.to_string(),
        }),
    )
}

/// POST `/checkin/submit`
///
/// Public self-check-in. The submitted name (or email, as fallback) is
/// matched against the roster with trimmed case-insensitive exact
/// comparison among students only; anyone not on the roster is rejected
/// before anything is written.
///
/// A duplicate submission is a soft success: the existing record stays
/// untouched and the response says `already_checked_in`.
pub async fn submit_checkin(
    State(state): State<AppState>,
    Json(body): Json<SubmitCheckinReq>,
) -> (StatusCode, Json<ApiResponse<SubmitCheckinResponse>>) {
    let db = state.db();

    if let Err(e) = body.validate() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::error(e.to_string())),
        );
    }

    let token = match checkin_token::Model::find_by_token(db, body.token.trim()).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "failed to look up check-in token");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "internal", "Database error");
        }
    };
    let Some(token) = token.filter(|t| t.active) else {
        return fail(
            StatusCode::NOT_FOUND,
            CODE_TOKEN_INVALID,
            "Check-in code is invalid or no longer active",
        );
    };

    let now = Utc::now();
    if token.is_expired_at(now) {
        let session_id = token.session_id;
        if let Err(e) = token.deactivate(db).await {
            tracing::warn!(error = %e, session_id, "failed to deactivate expired token");
        }
        return fail(
            StatusCode::GONE,
            CODE_TOKEN_EXPIRED,
            "Check-in code has expired",
        );
    }

    let session = match session::Model::find_by_id(db, token.session_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            return fail(
                StatusCode::NOT_FOUND,
                CODE_TOKEN_INVALID,
                "Check-in code is invalid or no longer active",
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load session for token");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "internal", "Database error");
        }
    };

    // Deterministic two-stage identity match: exact name first, email as
    // the fallback. No partial or fuzzy matching.
    let student = match user::Model::find_student_by_name(db, &body.student_name).await {
        Ok(Some(s)) => Some(s),
        Ok(None) => match body.student_email.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(email) => match user::Model::find_student_by_email(db, email).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "roster email lookup failed");
                    return fail(StatusCode::INTERNAL_SERVER_ERROR, "internal", "Database error");
                }
            },
            None => None,
        },
        Err(e) => {
            tracing::error!(error = %e, "roster name lookup failed");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, "internal", "Database error");
        }
    };
    let Some(student) = student else {
        return fail(
            StatusCode::FORBIDDEN,
            CODE_NOT_REGISTERED,
            "No matching student found on the course roster",
        );
    };

    match attendance_record::Model::insert_self_checkin(db, &session, &student.external_id, now)
        .await
    {
        Ok(CheckinOutcome::Recorded(status)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                SubmitCheckinResponse {
                    status: Some(status),
                    already_checked_in: false,
                    code: None,
                },
                "Check-in recorded",
            )),
        ),
        Ok(CheckinOutcome::AlreadyRecorded) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                SubmitCheckinResponse {
                    status: None,
                    already_checked_in: true,
                    code: None,
                },
                "Attendance was already recorded for this session",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, session_id = session.id, "self check-in insert failed");
            fail(StatusCode::INTERNAL_SERVER_ERROR, "internal", "Database error")
        }
    }
}
