use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use futures::future::join_all;
use sea_orm::EntityTrait;
use util::{config, state::AppState};

use crate::{auth::AuthUser, response::ApiResponse, services};

use super::common::{
    AttendanceRecordResponse, BulkMarkReq, BulkMarkResponse, IssueTokenReq, IssueTokenResponse,
    MarkAttendanceReq,
};
use db::models::attendance_record::AttendanceStatus;
use db::models::{attendance_record, checkin_token, course, session, user};

/// POST `/api/sessions/{session_id}/checkin/token`
///
/// Issue a fresh self-check-in token for a session, deactivating all prior
/// ones. The course roster is synced from the LMS first on a best-effort
/// basis, so the QR code that goes up on the beamer matches the current
/// enrollment; a failed sync is logged and never blocks issuance.
///
/// **Auth**: instructor.
pub async fn issue_checkin_token(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<IssueTokenReq>,
) -> (StatusCode, Json<ApiResponse<Option<IssueTokenResponse>>>) {
    let db = state.db();

    let session = match session::Model::find_by_id(db, session_id).await {
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

    if let Ok(Some(course)) = course::Entity::find_by_id(session.course_id).one(db).await {
        if let Err(e) = services::roster::sync_course_roster(db, &course.lms_course_id).await {
            tracing::warn!(error = %e, lms_course_id = %course.lms_course_id, "roster sync before token issuance failed");
        }
    }

    let valid_minutes = body
        .valid_minutes
        .unwrap_or(config::checkin_token_minutes() as i64)
        .clamp(1, 240);

    match checkin_token::Model::issue(db, session_id, claims.sub, valid_minutes).await {
        Ok(token) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                Some(IssueTokenResponse::from(token)),
                "Check-in token issued",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to issue check-in token");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to issue check-in token")),
            )
        }
    }
}

/// Derives the (minutes, window) triple for a manual mark. Statuses that
/// count as attended need a time window; absent and excused carry none.
fn resolve_mark_window(
    status: AttendanceStatus,
    present_from: Option<chrono::DateTime<chrono::Utc>>,
    present_to: Option<chrono::DateTime<chrono::Utc>>,
) -> Result<
    (
        i32,
        Option<chrono::DateTime<chrono::Utc>>,
        Option<chrono::DateTime<chrono::Utc>>,
    ),
    &'static str,
> {
    if status.counts_as_attended() {
        let (Some(from), Some(to)) = (present_from, present_to) else {
            return Err("present_from and present_to are required for this status");
        };
        if to <= from {
            return Err("present_to must be after present_from");
        }
        Ok((session::window_minutes(from, to), Some(from), Some(to)))
    } else {
        Ok((0, None, None))
    }
}

/// POST `/api/sessions/{session_id}/attendance`
///
/// Upsert a single attendance record on behalf of an instructor.
/// Last write wins, including over a prior self-check-in.
///
/// **Auth**: instructor.
pub async fn mark_attendance(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<MarkAttendanceReq>,
) -> (StatusCode, Json<ApiResponse<Option<AttendanceRecordResponse>>>) {
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
    if body.student_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("student_id is required")),
        );
    }

    let (minutes, from, to) =
        match resolve_mark_window(body.status, body.present_from, body.present_to) {
            Ok(v) => v,
            Err(msg) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(msg))),
        };

    let recorded_by = match user::Model::find_by_id(db, claims.sub).await {
        Ok(Some(u)) => u.external_id,
        _ => claims.sub.to_string(),
    };

    match attendance_record::Model::upsert_manual(
        db,
        session_id,
        body.student_id.trim(),
        body.status,
        from,
        to,
        minutes,
        body.break_minutes.unwrap_or(0).max(0),
        body.note.as_deref(),
        &recorded_by,
    )
    .await
    {
        Ok(record) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(AttendanceRecordResponse::from(record)),
                "Attendance recorded",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to upsert attendance record");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to record attendance")),
            )
        }
    }
}

/// POST `/api/sessions/{session_id}/attendance/bulk`
///
/// Apply the same status to many students at once. Each student is one
/// independent upsert, fanned out concurrently; there is no batch
/// transaction and partial failures only reduce the reported count.
///
/// **Auth**: instructor.
pub async fn bulk_mark_attendance(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<BulkMarkReq>,
) -> (StatusCode, Json<ApiResponse<BulkMarkResponse>>) {
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
    if body.student_ids.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("student_ids must not be empty")),
        );
    }

    let (minutes, from, to) =
        match resolve_mark_window(body.status, body.present_from, body.present_to) {
            Ok(v) => v,
            Err(msg) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(msg))),
        };

    let recorded_by = match user::Model::find_by_id(db, claims.sub).await {
        Ok(Some(u)) => u.external_id,
        _ => claims.sub.to_string(),
    };
    let break_minutes = body.break_minutes.unwrap_or(0).max(0);
    let status = body.status;

    let writes = body.student_ids.iter().map(|student_id| {
        let recorded_by = recorded_by.clone();
        async move {
            attendance_record::Model::upsert_manual(
                db,
                session_id,
                student_id.trim(),
                status,
                from,
                to,
                minutes,
                break_minutes,
                None,
                &recorded_by,
            )
            .await
            .map_err(|e| (student_id.clone(), e))
        }
    });

    let mut marked = 0usize;
    let mut failed = 0usize;
    for result in join_all(writes).await {
        match result {
            Ok(_) => marked += 1,
            Err((student_id, e)) => {
                tracing::warn!(error = %e, session_id, student_id, "bulk mark failed for student");
                failed += 1;
            }
        }
    }

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            BulkMarkResponse { marked, failed },
            format!("Marked {marked} students"),
        )),
    )
}

/// POST `/api/sessions/{session_id}/excuse`
///
/// Multipart upload of an excuse document (PDF/JPG/PNG, max 5 MB) by the
/// authenticated student. Sets the student's record for the session to
/// `excused`, creating the record first when none exists.
///
/// **Auth**: any authenticated roster member.
pub async fn upload_excuse(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    mut multipart: Multipart,
) -> (StatusCode, Json<ApiResponse<Option<AttendanceRecordResponse>>>) {
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

    let student = match user::Model::find_by_id(db, claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return (
                StatusCode::FORBIDDEN,
                Json(ApiResponse::error("Not on the roster")),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to load user");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving user")),
            );
        }
    };

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("").to_string();
            match field.bytes().await {
                Ok(bytes) => upload = Some((filename, bytes.to_vec())),
                Err(_) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(ApiResponse::error("Failed to read uploaded file")),
                    );
                }
            }
            break;
        }
    }
    let Some((filename, bytes)) = upload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Multipart field 'file' is required")),
        );
    };

    let stored = match services::excuses::store_excuse_file(
        session_id,
        &student.external_id,
        &filename,
        &bytes,
    )
    .await
    {
        Ok(name) => name,
        Err(services::excuses::ExcuseStoreError::Io(e)) => {
            tracing::error!(error = %e, session_id, "failed to store excuse file");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to store file")),
            );
        }
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string()))),
    };

    let record = match attendance_record::Model::find_for_student(
        db,
        session_id,
        &student.external_id,
    )
    .await
    {
        Ok(Some(existing)) => existing.attach_excuse(db, &stored).await,
        Ok(None) => {
            match attendance_record::Model::upsert_manual(
                db,
                session_id,
                &student.external_id,
                AttendanceStatus::Excused,
                None,
                None,
                0,
                0,
                None,
                "student",
            )
            .await
            {
                Ok(created) => created.attach_excuse(db, &stored).await,
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    };

    match record {
        Ok(r) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(AttendanceRecordResponse::from(r)),
                "Excuse uploaded",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, session_id, "failed to attach excuse");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Failed to record excuse")),
            )
        }
    }
}
