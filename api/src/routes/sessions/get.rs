//! Session resource: read-only routes (fetch session, check-in token
//! status, attendance ledger, CSV export).

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
};
use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;
use util::state::AppState;

use crate::response::ApiResponse;

use super::common::{
    AttendanceRecordResponse, LedgerRowResponse, SessionResponse, TokenStatusResponse, checkin_url,
};
use db::models::{attendance_record, checkin_token, session, user};

/// GET `/api/sessions/{session_id}`
///
/// Fetch a single session. **Auth**: instructor (router layer).
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<Option<SessionResponse>>>) {
    let db = state.db();

    match session::Model::find_by_id(db, session_id).await {
        Ok(Some(row)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(SessionResponse::from(row)),
                "Session retrieved",
            )),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Session not found")),
        ),
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to load session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving session")),
            )
        }
    }
}

/// GET `/api/sessions/{session_id}/checkin/status`
///
/// Report the current check-in token of a session. A token that has passed
/// its expiry is deactivated here as a side effect, so polling this
/// endpoint keeps the stored state honest.
///
/// **Auth**: instructor.
pub async fn get_checkin_status(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<TokenStatusResponse>>) {
    let db = state.db();

    match session::Model::find_by_id(db, session_id).await {
        Ok(Some(_)) => {}
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
    }

    let token = match checkin_token::Model::find_active(db, session_id).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to load check-in token");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving token")),
            );
        }
    };

    let resp = match token {
        None => TokenStatusResponse::default(),
        Some(t) if t.is_expired_at(Utc::now()) => {
            if let Err(e) = t.deactivate(db).await {
                tracing::warn!(error = %e, session_id, "failed to deactivate expired token");
            }
            TokenStatusResponse {
                active: false,
                expired: true,
                ..Default::default()
            }
        }
        Some(t) => TokenStatusResponse {
            active: true,
            expired: false,
            checkin_url: Some(checkin_url(&t.token)),
            expires_at: Some(t.expires_at.to_rfc3339()),
            token: Some(t.token),
        },
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(resp, "Check-in token status")),
    )
}

/// GET `/api/sessions/{session_id}/attendance`
///
/// The session ledger: one row per roster student, with the attendance
/// record attached where one exists.
///
/// **Auth**: instructor.
pub async fn list_attendance(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<Vec<LedgerRowResponse>>>) {
    let db = state.db();

    match session::Model::find_by_id(db, session_id).await {
        Ok(Some(_)) => {}
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
    }

    let students = match user::Model::list_students(db).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "failed to load roster");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving roster")),
            );
        }
    };
    let records = match attendance_record::Model::list_for_session(db, session_id).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to load attendance records");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving records")),
            );
        }
    };

    let mut by_student: HashMap<String, attendance_record::Model> = records
        .into_iter()
        .map(|r| (r.student_id.clone(), r))
        .collect();

    let rows = students
        .into_iter()
        .map(|s| LedgerRowResponse {
            record: by_student
                .remove(&s.external_id)
                .map(AttendanceRecordResponse::from),
            student_id: s.external_id,
            name: s.name,
            email: s.email,
        })
        .collect();

    (
        StatusCode::OK,
        Json(ApiResponse::success(rows, "Attendance records retrieved")),
    )
}

/// GET `/api/sessions/{session_id}/attendance/export`
///
/// Download the session ledger as CSV.
///
/// **Auth**: instructor.
pub async fn export_attendance_csv(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, (HeaderMap, String)) {
    let db = state.db();

    let plain = |status: StatusCode, body: &str| {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        (status, (headers, body.to_string()))
    };

    let records = match attendance_record::Model::list_for_session(db, session_id).await {
        Ok(v) => v,
        Err(_) => return plain(StatusCode::INTERNAL_SERVER_ERROR, "error"),
    };
    let students = match user::Model::list_students(db).await {
        Ok(v) => v,
        Err(_) => return plain(StatusCode::INTERNAL_SERVER_ERROR, "error"),
    };

    let mut contact: HashMap<&str, (&str, &str)> = HashMap::new();
    for s in &students {
        contact.insert(s.external_id.as_str(), (s.name.as_str(), s.email.as_str()));
    }

    fn esc(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }

    let mut csv =
        String::from("name,email,status,present_from,present_to,minutes,break_minutes,net_minutes,hours,note\n");
    for r in records {
        let (name, email) = contact
            .get(r.student_id.as_str())
            .copied()
            .unwrap_or((r.student_id.as_str(), ""));
        let from = r
            .present_from
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        let to = r
            .present_to
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        let hours = (r.net_minutes as f64 / 60.0 * 100.0).round() / 100.0;

        let row = format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            esc(name),
            esc(email),
            r.status,
            esc(&from),
            esc(&to),
            r.minutes,
            r.break_minutes,
            r.net_minutes,
            hours,
            esc(r.note.as_deref().unwrap_or(""))
        );
        csv.push_str(&row);
    }

    let filename = format!("attendance_session_{}.csv", session_id);

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        axum::http::header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .unwrap_or(HeaderValue::from_static("attachment")),
    );

    (StatusCode::OK, (headers, csv))
}
