//! Attendance statistics, computed from loaded sessions and records rather
//! than in SQL so the rounding rules live in one place.

use std::collections::HashMap;

use sea_orm::{DatabaseConnection, DbErr};
use serde::Serialize;

use crate::models::attendance_record::{self, AttendanceStatus};
use crate::models::{session, user};

/// Aggregate attendance figures for one student over a set of sessions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentStats {
    pub total_sessions: i64,
    pub attended_sessions: i64,
    /// Sum of net minutes over attended records only.
    pub total_minutes: i64,
    /// Sum of the planned durations of all sessions.
    pub expected_minutes: i64,
    /// `total_minutes` in hours, rounded to two decimals.
    pub total_hours: f64,
    /// Attended share in percent, one decimal. Zero when there are no
    /// sessions at all.
    pub attendance_rate: f64,
    /// Net time share of the expected time in percent, one decimal. Zero
    /// when no time was expected.
    pub time_rate: f64,
}

/// One student row of the course overview matrix.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewRow {
    pub student_id: String,
    pub name: String,
    pub email: String,
    /// Status per session, aligned with the matrix header order. `None`
    /// means no record exists for that session.
    pub statuses: Vec<Option<AttendanceStatus>>,
    pub stats: StudentStats,
}

/// The whole course matrix: sessions in chronological order crossed with
/// every student on the roster.
#[derive(Debug, Clone, Serialize)]
pub struct CourseOverview {
    pub sessions: Vec<session::Model>,
    pub rows: Vec<OverviewRow>,
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Computes the aggregate figures for one student's records against the
/// course's sessions.
pub fn student_stats(
    sessions: &[session::Model],
    records: &[attendance_record::Model],
) -> StudentStats {
    let total_sessions = sessions.len() as i64;
    let expected_minutes: i64 = sessions.iter().map(|s| s.expected_minutes as i64).sum();

    // Only attended statuses contribute minutes; an excused record may still
    // carry the minutes of an earlier check-in.
    let attended_sessions = records
        .iter()
        .filter(|r| r.status.counts_as_attended())
        .count() as i64;
    let total_minutes: i64 = records
        .iter()
        .filter(|r| r.status.counts_as_attended())
        .map(|r| r.net_minutes as i64)
        .sum();

    let attendance_rate = if total_sessions > 0 {
        round_to(attended_sessions as f64 / total_sessions as f64 * 100.0, 1)
    } else {
        0.0
    };
    let time_rate = if expected_minutes > 0 {
        round_to(total_minutes as f64 / expected_minutes as f64 * 100.0, 1)
    } else {
        0.0
    };

    StudentStats {
        total_sessions,
        attended_sessions,
        total_minutes,
        expected_minutes,
        total_hours: round_to(total_minutes as f64 / 60.0, 2),
        attendance_rate,
        time_rate,
    }
}

/// Loads the stats of a single student for a course.
pub async fn stats_for_student(
    db: &DatabaseConnection,
    course_id: i64,
    student_id: &str,
) -> Result<StudentStats, DbErr> {
    let sessions = session::Model::list_for_course_chronological(db, course_id).await?;
    let session_ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
    let records =
        attendance_record::Model::list_for_student_in_sessions(db, &session_ids, student_id)
            .await?;
    Ok(student_stats(&sessions, &records))
}

/// Builds the full sessions-by-students matrix for a course, one query per
/// table instead of one per cell.
pub async fn course_overview(
    db: &DatabaseConnection,
    course_id: i64,
) -> Result<CourseOverview, DbErr> {
    let sessions = session::Model::list_for_course_chronological(db, course_id).await?;
    let session_ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
    let students = user::Model::list_students(db).await?;
    let records = attendance_record::Model::list_for_sessions(db, &session_ids).await?;

    let mut by_student: HashMap<&str, HashMap<i64, &attendance_record::Model>> = HashMap::new();
    for record in &records {
        by_student
            .entry(record.student_id.as_str())
            .or_default()
            .insert(record.session_id, record);
    }

    let rows = students
        .iter()
        .map(|student| {
            let own = by_student.get(student.external_id.as_str());
            let statuses: Vec<Option<AttendanceStatus>> = sessions
                .iter()
                .map(|s| own.and_then(|m| m.get(&s.id)).map(|r| r.status))
                .collect();
            let own_records: Vec<attendance_record::Model> = own
                .map(|m| m.values().map(|r| (*r).clone()).collect())
                .unwrap_or_default();
            OverviewRow {
                student_id: student.external_id.clone(),
                name: student.name.clone(),
                email: student.email.clone(),
                stats: student_stats(&sessions, &own_records),
                statuses,
            }
        })
        .collect();

    Ok(CourseOverview { sessions, rows })
}
