use chrono::{DateTime, Duration, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Minutes after a session's start during which a self-check-in still counts
/// as `present` rather than `late`.
pub const LATE_GRACE_MINUTES: i64 = 5;

/// One student's attendance at one session.
///
/// `student_id` is the normalized external LMS identity, not a local row id,
/// so records survive roster re-syncs. The (session, student) pair is unique
/// at the storage level.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub student_id: String,
    pub status: AttendanceStatus,
    pub present_from: Option<DateTime<Utc>>,
    pub present_to: Option<DateTime<Utc>>,
    /// Gross minutes credited for the session.
    pub minutes: i32,
    pub break_minutes: i32,
    /// Always `max(minutes - break_minutes, 0)`, recomputed on every write.
    pub net_minutes: i32,
    pub note: Option<String>,
    /// Who wrote the record: a lecturer's external id, or `self-checkin`.
    pub recorded_by: String,
    pub excuse_file: Option<String>,
    pub excuse_uploaded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Enum representing the attendance status of a record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_status_type")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AttendanceStatus {
    #[sea_orm(string_value = "present")]
    Present,
    #[sea_orm(string_value = "late")]
    Late,
    #[sea_orm(string_value = "partial")]
    Partial,
    #[sea_orm(string_value = "absent")]
    Absent,
    #[sea_orm(string_value = "excused")]
    Excused,
}

impl AttendanceStatus {
    /// Whether this status counts towards attended sessions in statistics.
    pub fn counts_as_attended(&self) -> bool {
        matches!(self, Self::Present | Self::Late | Self::Partial)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::session::Entity",
        from = "Column::SessionId",
        to = "super::session::Column::Id"
    )]
    Session,
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Outcome of a self-check-in attempt against the storage-level duplicate
/// guard.
#[derive(Debug, PartialEq)]
pub enum CheckinOutcome {
    /// A new record was written with the given status.
    Recorded(AttendanceStatus),
    /// A record for this (session, student) pair already existed; it was
    /// left untouched.
    AlreadyRecorded,
}

pub fn net_of(minutes: i32, break_minutes: i32) -> i32 {
    (minutes - break_minutes).max(0)
}

impl Model {
    pub async fn find_for_student(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::StudentId.eq(student_id))
            .one(db)
            .await
    }

    pub async fn list_for_session(
        db: &DatabaseConnection,
        session_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .order_by_asc(Column::StudentId)
            .all(db)
            .await
    }

    /// All records a student holds across the given sessions.
    pub async fn list_for_student_in_sessions(
        db: &DatabaseConnection,
        session_ids: &[i64],
        student_id: &str,
    ) -> Result<Vec<Self>, DbErr> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::SessionId.is_in(session_ids.to_vec()))
            .filter(Column::StudentId.eq(student_id))
            .all(db)
            .await
    }

    pub async fn list_for_sessions(
        db: &DatabaseConnection,
        session_ids: &[i64],
    ) -> Result<Vec<Self>, DbErr> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::SessionId.is_in(session_ids.to_vec()))
            .all(db)
            .await
    }

    /// Writes or overwrites a record on behalf of a lecturer. Last write
    /// wins; an existing record (including a prior self-check-in) is
    /// replaced wholesale.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_manual(
        db: &DatabaseConnection,
        session_id: i64,
        student_id: &str,
        status: AttendanceStatus,
        present_from: Option<DateTime<Utc>>,
        present_to: Option<DateTime<Utc>>,
        minutes: i32,
        break_minutes: i32,
        note: Option<&str>,
        recorded_by: &str,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        match Self::find_for_student(db, session_id, student_id).await? {
            Some(existing) => {
                let mut active: ActiveModel = existing.into();
                active.status = Set(status);
                active.present_from = Set(present_from);
                active.present_to = Set(present_to);
                active.minutes = Set(minutes);
                active.break_minutes = Set(break_minutes);
                active.net_minutes = Set(net_of(minutes, break_minutes));
                active.note = Set(note.map(str::to_string));
                active.recorded_by = Set(recorded_by.to_string());
                active.updated_at = Set(now);
                active.update(db).await
            }
            None => ActiveModel {
                id: NotSet,
                session_id: Set(session_id),
                student_id: Set(student_id.to_string()),
                status: Set(status),
                present_from: Set(present_from),
                present_to: Set(present_to),
                minutes: Set(minutes),
                break_minutes: Set(break_minutes),
                net_minutes: Set(net_of(minutes, break_minutes)),
                note: Set(note.map(str::to_string)),
                recorded_by: Set(recorded_by.to_string()),
                excuse_file: Set(None),
                excuse_uploaded_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(db)
            .await,
        }
    }

    /// Records a self-check-in. The planned session window is credited in
    /// full; the scan instant only decides between `present` and `late`
    /// (grace of [`LATE_GRACE_MINUTES`] past the start).
    ///
    /// The insert goes through `ON CONFLICT DO NOTHING` on the unique
    /// (session, student) pair, so two concurrent scans of the same QR code
    /// cannot produce two rows and the loser sees `AlreadyRecorded`.
    pub async fn insert_self_checkin(
        db: &DatabaseConnection,
        session: &super::session::Model,
        student_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CheckinOutcome, DbErr> {
        let status = if now > session.start_ts + Duration::minutes(LATE_GRACE_MINUTES) {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        };
        let minutes = super::session::window_minutes(session.start_ts, session.end_ts);

        let record = ActiveModel {
            id: NotSet,
            session_id: Set(session.id),
            student_id: Set(student_id.to_string()),
            status: Set(status),
            present_from: Set(Some(session.start_ts)),
            present_to: Set(Some(session.end_ts)),
            minutes: Set(minutes),
            break_minutes: Set(0),
            net_minutes: Set(minutes),
            note: Set(Some(format!(
                "Self-Check-In via QR-Code um {}",
                now.format("%H:%M")
            ))),
            recorded_by: Set("self-checkin".to_string()),
            excuse_file: Set(None),
            excuse_uploaded_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let res = Entity::insert(record)
            .on_conflict(
                OnConflict::columns([Column::SessionId, Column::StudentId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec(db)
            .await;

        match res {
            Ok(_) => Ok(CheckinOutcome::Recorded(status)),
            Err(DbErr::RecordNotInserted) => Ok(CheckinOutcome::AlreadyRecorded),
            Err(e) => Err(e),
        }
    }

    /// Attaches an uploaded excuse document and flips the status to excused.
    pub async fn attach_excuse(
        self,
        db: &DatabaseConnection,
        stored_path: &str,
    ) -> Result<Self, DbErr> {
        let mut active: ActiveModel = self.into();
        active.status = Set(AttendanceStatus::Excused);
        active.excuse_file = Set(Some(stored_path.to_string()));
        active.excuse_uploaded_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }

    pub async fn delete_by_id(db: &DatabaseConnection, id: i64) -> Result<bool, DbErr> {
        let res = Entity::delete_by_id(id).exec(db).await?;
        Ok(res.rows_affected > 0)
    }
}
