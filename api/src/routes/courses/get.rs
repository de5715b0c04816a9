//! Course resource: read-only routes (session list, roster, per-student
//! statistics, overview matrix, certificate payload, CSV export).

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
};
use chrono::Utc;
use sea_orm::{DatabaseConnection, DbErr};
use util::state::AppState;

use crate::{auth::AuthUser, response::ApiResponse, routes::sessions::SessionResponse};

use super::common::{
    CertificateCourse, CertificateResponse, RosterStudentResponse, StudentStatsResponse,
    session_status_list,
};
use db::models::{attendance_record, course, session, user};
use db::stats::{self, CourseOverview};

/// GET `/api/courses/{lms_course_id}/sessions`
///
/// List the sessions of a course, newest first. The course row is created
/// lazily on first touch.
///
/// **Auth**: any authenticated roster member.
pub async fn list_sessions(
    State(state): State<AppState>,
    Path(lms_course_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<Vec<SessionResponse>>>) {
    let db = state.db();

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

    match session::Model::list_for_course(db, course.id).await {
        Ok(rows) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                rows.into_iter().map(SessionResponse::from).collect(),
                "Sessions retrieved",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "failed to list sessions");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving sessions")),
            )
        }
    }
}

/// GET `/api/courses/{lms_course_id}/roster`
///
/// List the student roster. **Auth**: instructor.
pub async fn get_roster(
    State(state): State<AppState>,
    Path(_lms_course_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<Vec<RosterStudentResponse>>>) {
    let db = state.db();

    match user::Model::list_students(db).await {
        Ok(students) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                students
                    .into_iter()
                    .map(RosterStudentResponse::from)
                    .collect(),
                "Roster retrieved",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to list roster");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving roster")),
            )
        }
    }
}

async fn load_student_view(
    db: &DatabaseConnection,
    course_id: i64,
    external_id: &str,
) -> Result<(Vec<session::Model>, Vec<attendance_record::Model>), DbErr> {
    let sessions = session::Model::list_for_course_chronological(db, course_id).await?;
    let session_ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
    let records =
        attendance_record::Model::list_for_student_in_sessions(db, &session_ids, external_id)
            .await?;
    Ok((sessions, records))
}

fn student_stats_response(
    external_id: &str,
    sessions: &[session::Model],
    records: &[attendance_record::Model],
) -> StudentStatsResponse {
    StudentStatsResponse {
        student_id: external_id.to_string(),
        stats: stats::student_stats(sessions, records),
        sessions: session_status_list(sessions, records),
    }
}

/// GET `/api/courses/{lms_course_id}/students/{external_id}/stats`
///
/// Per-student attendance statistics with the per-session status list.
///
/// **Auth**: instructor.
pub async fn get_student_stats(
    State(state): State<AppState>,
    Path((lms_course_id, external_id)): Path<(String, String)>,
) -> (StatusCode, Json<ApiResponse<Option<StudentStatsResponse>>>) {
    let db = state.db();

    let course = match course::Model::find_by_lms_id(db, &lms_course_id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Course not found")),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "failed to load course");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving course")),
            );
        }
    };

    match load_student_view(db, course.id, &external_id).await {
        Ok((sessions, records)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(student_stats_response(&external_id, &sessions, &records)),
                "Student statistics retrieved",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, external_id, "failed to load student stats");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving statistics")),
            )
        }
    }
}

/// GET `/api/courses/{lms_course_id}/me/stats`
///
/// Same payload as the instructor-facing per-student stats, scoped to the
/// authenticated user.
pub async fn get_my_stats(
    State(state): State<AppState>,
    Path(lms_course_id): Path<String>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Option<StudentStatsResponse>>>) {
    let db = state.db();

    let me = match user::Model::find_by_id(db, claims.sub).await {
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

    match load_student_view(db, course.id, &me.external_id).await {
        Ok((sessions, records)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                Some(student_stats_response(&me.external_id, &sessions, &records)),
                "Statistics retrieved",
            )),
        ),
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "failed to load own stats");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving statistics")),
            )
        }
    }
}

/// GET `/api/courses/{lms_course_id}/me/certificate`
///
/// JSON payload of the attendance certificate for the authenticated
/// student: identity, course, per-session rows and totals. Rendering the
/// actual PDF is left to the caller.
pub async fn get_my_certificate(
    State(state): State<AppState>,
    Path(lms_course_id): Path<String>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Option<CertificateResponse>>>) {
    let db = state.db();

    let me = match user::Model::find_by_id(db, claims.sub).await {
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
    let course = match course::Model::find_by_lms_id(db, &lms_course_id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Course not found")),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "failed to load course");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving course")),
            );
        }
    };

    match load_student_view(db, course.id, &me.external_id).await {
        Ok((sessions, records)) => {
            let totals = stats::student_stats(&sessions, &records);
            let payload = CertificateResponse {
                sessions: session_status_list(&sessions, &records),
                student: RosterStudentResponse::from(me),
                course: CertificateCourse {
                    lms_course_id: course.lms_course_id,
                    course_name: course.course_name,
                },
                totals,
                issued_at: Utc::now().to_rfc3339(),
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(Some(payload), "Certificate generated")),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "failed to build certificate");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error building certificate")),
            )
        }
    }
}

/// GET `/api/courses/{lms_course_id}/overview`
///
/// The instructor matrix: one row per roster student crossed with every
/// session of the course, plus trailing per-student stats.
///
/// **Auth**: instructor.
pub async fn get_overview(
    State(state): State<AppState>,
    Path(lms_course_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<Option<CourseOverview>>>) {
    let db = state.db();

    let course = match course::Model::find_by_lms_id(db, &lms_course_id).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error("Course not found")),
            );
        }
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "failed to load course");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error retrieving course")),
            );
        }
    };

    match stats::course_overview(db, course.id).await {
        Ok(overview) => (
            StatusCode::OK,
            Json(ApiResponse::success(Some(overview), "Overview retrieved")),
        ),
        Err(e) => {
            tracing::error!(error = %e, lms_course_id, "failed to build overview");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Database error building overview")),
            )
        }
    }
}

/// GET `/api/courses/{lms_course_id}/overview/export`
///
/// Download the overview matrix as CSV: student rows, one column per
/// session, trailing rate and hours columns.
///
/// **Auth**: instructor.
pub async fn export_overview_csv(
    State(state): State<AppState>,
    Path(lms_course_id): Path<String>,
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

    let course = match course::Model::find_by_lms_id(db, &lms_course_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return plain(StatusCode::NOT_FOUND, "course not found"),
        Err(_) => return plain(StatusCode::INTERNAL_SERVER_ERROR, "error"),
    };
    let overview = match stats::course_overview(db, course.id).await {
        Ok(o) => o,
        Err(_) => return plain(StatusCode::INTERNAL_SERVER_ERROR, "error"),
    };

    fn esc(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }

    let mut csv = String::from("name,email");
    for s in &overview.sessions {
        csv.push(',');
        csv.push_str(&esc(&format!("{} ({})", s.title, s.start_ts.format("%Y-%m-%d"))));
    }
    csv.push_str(",attendance_rate,total_hours\n");

    for row in &overview.rows {
        csv.push_str(&esc(&row.name));
        csv.push(',');
        csv.push_str(&esc(&row.email));
        for status in &row.statuses {
            csv.push(',');
            if let Some(status) = status {
                csv.push_str(&status.to_string());
            }
        }
        csv.push_str(&format!(
            ",{},{}\n",
            row.stats.attendance_rate, row.stats.total_hours
        ));
    }

    let filename = format!("attendance_overview_{}.csv", course.lms_course_id);

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
