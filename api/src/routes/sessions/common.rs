use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use db::models::attendance_record::AttendanceStatus;
use db::models::{attendance_record, checkin_token, session};
use util::config;

/// Public self-check-in URL for a token, built from `PUBLIC_URL`.
pub fn checkin_url(token: &str) -> String {
    format!(
        "{}/checkin/{}",
        config::public_url().trim_end_matches('/'),
        token
    )
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub course_id: i64,
    pub created_by: i64,
    pub title: String,
    pub session_type: String,
    pub start_ts: String,
    pub end_ts: String,
    pub expected_minutes: i32,
    pub location: Option<String>,
    pub description: Option<String>,
    pub mandatory: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<session::Model> for SessionResponse {
    fn from(m: session::Model) -> Self {
        Self {
            id: m.id,
            course_id: m.course_id,
            created_by: m.created_by,
            title: m.title,
            session_type: m.session_type,
            start_ts: m.start_ts.to_rfc3339(),
            end_ts: m.end_ts.to_rfc3339(),
            expected_minutes: m.expected_minutes,
            location: m.location,
            description: m.description,
            mandatory: m.mandatory,
            created_at: m.created_at.to_rfc3339(),
            updated_at: m.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EditSessionReq {
    pub title: Option<String>,
    pub session_type: Option<String>,
    pub start_ts: Option<DateTime<Utc>>,
    pub end_ts: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub mandatory: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct IssueTokenReq {
    /// Token lifetime in minutes, clamped to 1..=240. Defaults to the
    /// configured check-in window.
    pub valid_minutes: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct IssueTokenResponse {
    pub token: String,
    pub expires_at: String,
    pub checkin_url: String,
}

impl From<checkin_token::Model> for IssueTokenResponse {
    fn from(m: checkin_token::Model) -> Self {
        Self {
            checkin_url: checkin_url(&m.token),
            expires_at: m.expires_at.to_rfc3339(),
            token: m.token,
        }
    }
}

#[derive(Debug, Serialize, Default)]
pub struct TokenStatusResponse {
    pub active: bool,
    pub expired: bool,
    pub token: Option<String>,
    pub expires_at: Option<String>,
    pub checkin_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttendanceRecordResponse {
    pub id: i64,
    pub session_id: i64,
    pub student_id: String,
    pub status: AttendanceStatus,
    pub present_from: Option<String>,
    pub present_to: Option<String>,
    pub minutes: i32,
    pub break_minutes: i32,
    pub net_minutes: i32,
    pub note: Option<String>,
    pub recorded_by: String,
    pub excuse_file: Option<String>,
}

impl From<attendance_record::Model> for AttendanceRecordResponse {
    fn from(m: attendance_record::Model) -> Self {
        Self {
            id: m.id,
            session_id: m.session_id,
            student_id: m.student_id,
            status: m.status,
            present_from: m.present_from.map(|t| t.to_rfc3339()),
            present_to: m.present_to.map(|t| t.to_rfc3339()),
            minutes: m.minutes,
            break_minutes: m.break_minutes,
            net_minutes: m.net_minutes,
            note: m.note,
            recorded_by: m.recorded_by,
            excuse_file: m.excuse_file,
        }
    }
}

/// One roster student row of the session ledger view. `record` is `None`
/// when nothing was recorded for that student yet.
#[derive(Debug, Serialize)]
pub struct LedgerRowResponse {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub record: Option<AttendanceRecordResponse>,
}

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceReq {
    pub student_id: String,
    pub status: AttendanceStatus,
    pub present_from: Option<DateTime<Utc>>,
    pub present_to: Option<DateTime<Utc>>,
    pub break_minutes: Option<i32>,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkMarkReq {
    pub student_ids: Vec<String>,
    pub status: AttendanceStatus,
    pub present_from: Option<DateTime<Utc>>,
    pub present_to: Option<DateTime<Utc>>,
    pub break_minutes: Option<i32>,
}

#[derive(Debug, Serialize, Default)]
pub struct BulkMarkResponse {
    pub marked: usize,
    pub failed: usize,
}
