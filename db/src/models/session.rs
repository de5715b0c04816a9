use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, QueryFilter, QueryOrder};

/// A course meeting instance with its planned time window.
///
/// `expected_minutes` is always derived from the window, never stored
/// directly by callers.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub course_id: i64,
    pub created_by: i64,
    pub title: String,
    pub session_type: String,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub expected_minutes: i32,
    pub location: Option<String>,
    pub description: Option<String>,
    pub mandatory: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::course::Entity",
        from = "Column::CourseId",
        to = "super::course::Column::Id"
    )]
    Course,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatedBy",
        to = "super::user::Column::Id"
    )]
    Creator,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
    #[sea_orm(has_many = "super::checkin_token::Entity")]
    Tokens,
}

impl Related<super::course::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Course.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl Related<super::checkin_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Whole minutes between two timestamps, rounded, floored at zero.
pub fn window_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    let secs = (to - from).num_seconds();
    if secs <= 0 {
        return 0;
    }
    ((secs as f64) / 60.0).round() as i32
}

#[allow(clippy::too_many_arguments)]
impl Model {
    pub async fn create(
        db: &DatabaseConnection,
        course_id: i64,
        created_by: i64,
        title: &str,
        session_type: &str,
        start_ts: DateTime<Utc>,
        end_ts: DateTime<Utc>,
        location: Option<&str>,
        description: Option<&str>,
        mandatory: bool,
    ) -> Result<Self, DbErr> {
        let now = Utc::now();
        ActiveModel {
            id: NotSet,
            course_id: Set(course_id),
            created_by: Set(created_by),
            title: Set(title.to_string()),
            session_type: Set(session_type.to_string()),
            start_ts: Set(start_ts),
            end_ts: Set(end_ts),
            expected_minutes: Set(window_minutes(start_ts, end_ts)),
            location: Set(location.map(str::to_string)),
            description: Set(description.map(str::to_string)),
            mandatory: Set(mandatory),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Sessions of a course, newest first.
    pub async fn list_for_course(
        db: &DatabaseConnection,
        course_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .order_by_desc(Column::StartTs)
            .all(db)
            .await
    }

    /// Sessions of a course in chronological order, the shape exports and
    /// the overview matrix want.
    pub async fn list_for_course_chronological(
        db: &DatabaseConnection,
        course_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::CourseId.eq(course_id))
            .order_by_asc(Column::StartTs)
            .all(db)
            .await
    }

    /// Applies an instructor edit, recomputing the expected duration from the
    /// (possibly changed) window.
    pub async fn apply_edit(
        self,
        db: &DatabaseConnection,
        title: Option<&str>,
        session_type: Option<&str>,
        start_ts: Option<DateTime<Utc>>,
        end_ts: Option<DateTime<Utc>>,
        location: Option<Option<String>>,
        description: Option<Option<String>>,
        mandatory: Option<bool>,
    ) -> Result<Self, DbErr> {
        let new_start = start_ts.unwrap_or(self.start_ts);
        let new_end = end_ts.unwrap_or(self.end_ts);

        let mut active: ActiveModel = self.into();
        if let Some(t) = title {
            active.title = Set(t.to_string());
        }
        if let Some(t) = session_type {
            active.session_type = Set(t.to_string());
        }
        active.start_ts = Set(new_start);
        active.end_ts = Set(new_end);
        active.expected_minutes = Set(window_minutes(new_start, new_end));
        if let Some(l) = location {
            active.location = Set(l);
        }
        if let Some(d) = description {
            active.description = Set(d);
        }
        if let Some(m) = mandatory {
            active.mandatory = Set(m);
        }
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }

    pub async fn delete_by_id(db: &DatabaseConnection, id: i64) -> Result<bool, DbErr> {
        let res = Entity::delete_by_id(id).exec(db).await?;
        Ok(res.rows_affected > 0)
    }
}
