use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Alias, Expr, Func, SimpleExpr};
use sea_orm::{DatabaseConnection, QueryFilter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Represents a roster entry in the `users` table.
///
/// Rows are created and refreshed by roster sync (or an LTI launch) and are
/// never deleted, only upserted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Primary key ID (auto-incremented).
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Stable LMS identity string, normalized (SIS prefix stripped).
    pub external_id: String,
    /// Display name as supplied by the LMS.
    pub name: String,
    pub email: String,
    /// Role within the course.
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Enum representing a roster member's role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "user_role_type")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[sea_orm(string_value = "student")]
    Student,
    #[sea_orm(string_value = "instructor")]
    Instructor,
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

/// `LOWER(TRIM(col))`, the normalization applied to both sides of every
/// roster identity match.
fn lower_trim(col: Column) -> SimpleExpr {
    Func::lower(Func::cust(Alias::new("TRIM")).arg(Expr::col(col))).into()
}

impl Model {
    /// Normalizes a raw LMS identity string: trims whitespace and strips the
    /// configured SIS prefix (e.g. `SK_lerner01` becomes `lerner01`).
    pub fn normalize_external_id(raw: &str, sis_prefix: Option<&str>) -> String {
        let trimmed = raw.trim();
        match sis_prefix {
            Some(p) if !p.is_empty() => trimmed
                .strip_prefix(p)
                .unwrap_or(trimmed)
                .to_string(),
            _ => trimmed.to_string(),
        }
    }

    /// Inserts the roster entry, or updates name/email in place when it
    /// already exists. The role of an existing entry is left untouched so a
    /// student sync cannot demote an instructor.
    pub async fn upsert(
        db: &DatabaseConnection,
        external_id: &str,
        name: &str,
        email: &str,
        role: Role,
    ) -> Result<Self, DbErr> {
        match Self::find_by_external_id(db, external_id).await? {
            Some(existing) => {
                let mut active: ActiveModel = existing.into();
                active.name = Set(name.to_string());
                active.email = Set(email.to_string());
                active.updated_at = Set(Utc::now());
                active.update(db).await
            }
            None => {
                let now = Utc::now();
                ActiveModel {
                    id: NotSet,
                    external_id: Set(external_id.to_string()),
                    name: Set(name.to_string()),
                    email: Set(email.to_string()),
                    role: Set(role),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(db)
                .await
            }
        }
    }

    pub async fn find_by_external_id(
        db: &DatabaseConnection,
        external_id: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::ExternalId.eq(external_id))
            .one(db)
            .await
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Case-insensitive, whitespace-trimmed exact match on display name,
    /// restricted to students. No partial or fuzzy matching.
    pub async fn find_student_by_name(
        db: &DatabaseConnection,
        name: &str,
    ) -> Result<Option<Self>, DbErr> {
        let needle = name.trim().to_lowercase();
        Entity::find()
            .filter(Expr::expr(lower_trim(Column::Name)).eq(needle))
            .filter(Column::Role.eq(Role::Student))
            .one(db)
            .await
    }

    /// Same contract as [`Self::find_student_by_name`], keyed on email.
    pub async fn find_student_by_email(
        db: &DatabaseConnection,
        email: &str,
    ) -> Result<Option<Self>, DbErr> {
        let needle = email.trim().to_lowercase();
        Entity::find()
            .filter(Expr::expr(lower_trim(Column::Email)).eq(needle))
            .filter(Column::Role.eq(Role::Student))
            .one(db)
            .await
    }

    /// All students on the roster, ordered by display name.
    pub async fn list_students(db: &DatabaseConnection) -> Result<Vec<Self>, DbErr> {
        use sea_orm::QueryOrder;
        Entity::find()
            .filter(Column::Role.eq(Role::Student))
            .order_by_asc(Column::Name)
            .all(db)
            .await
    }

    pub fn is_instructor(&self) -> bool {
        self.role == Role::Instructor
    }
}
