use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use db::models::attendance_record::AttendanceStatus;
use db::models::{attendance_record, session, user};
use db::stats::StudentStats;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionReq {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    pub session_type: Option<String>,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub mandatory: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RosterStudentResponse {
    pub external_id: String,
    pub name: String,
    pub email: String,
}

impl From<user::Model> for RosterStudentResponse {
    fn from(m: user::Model) -> Self {
        Self {
            external_id: m.external_id,
            name: m.name,
            email: m.email,
        }
    }
}

#[derive(Debug, Serialize, Default)]
pub struct SyncResponse {
    pub synced: usize,
}

/// One session line of a per-student stats or certificate payload.
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: i64,
    pub title: String,
    pub start_ts: String,
    pub status: Option<AttendanceStatus>,
    pub net_minutes: i32,
}

#[derive(Debug, Serialize)]
pub struct StudentStatsResponse {
    pub student_id: String,
    pub stats: StudentStats,
    pub sessions: Vec<SessionStatusResponse>,
}

/// Builds the per-session status list for one student from already loaded
/// sessions (chronological) and the student's records.
pub fn session_status_list(
    sessions: &[session::Model],
    records: &[attendance_record::Model],
) -> Vec<SessionStatusResponse> {
    sessions
        .iter()
        .map(|s| {
            let record = records.iter().find(|r| r.session_id == s.id);
            SessionStatusResponse {
                session_id: s.id,
                title: s.title.clone(),
                start_ts: s.start_ts.to_rfc3339(),
                status: record.map(|r| r.status),
                net_minutes: record.map(|r| r.net_minutes).unwrap_or(0),
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct CertificateResponse {
    pub student: RosterStudentResponse,
    pub course: CertificateCourse,
    pub sessions: Vec<SessionStatusResponse>,
    pub totals: StudentStats,
    pub issued_at: String,
}

#[derive(Debug, Serialize)]
pub struct CertificateCourse {
    pub lms_course_id: String,
    pub course_name: Option<String>,
}
