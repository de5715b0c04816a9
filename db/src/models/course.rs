use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, QueryFilter};

/// A course as known to this tool, keyed by the LMS course identifier.
///
/// Courses appear lazily: the first touch of an unknown LMS course id
/// creates the row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "courses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub lms_course_id: String,
    pub course_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::session::Entity")]
    Sessions,
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find_by_lms_id(
        db: &DatabaseConnection,
        lms_course_id: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::LmsCourseId.eq(lms_course_id))
            .one(db)
            .await
    }

    /// Fetches the course for an LMS id, creating it on first touch. When a
    /// name is supplied it refreshes the stored one (launch claims carry the
    /// current course title).
    pub async fn get_or_create(
        db: &DatabaseConnection,
        lms_course_id: &str,
        course_name: Option<&str>,
    ) -> Result<Self, DbErr> {
        match Self::find_by_lms_id(db, lms_course_id).await? {
            Some(existing) => {
                if let Some(name) = course_name {
                    if existing.course_name.as_deref() != Some(name) {
                        let mut active: ActiveModel = existing.into();
                        active.course_name = Set(Some(name.to_string()));
                        active.updated_at = Set(Utc::now());
                        return active.update(db).await;
                    }
                }
                Ok(existing)
            }
            None => {
                let now = Utc::now();
                ActiveModel {
                    id: NotSet,
                    lms_course_id: Set(lms_course_id.to_string()),
                    course_name: Set(course_name.map(str::to_string)),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(db)
                .await
            }
        }
    }
}
