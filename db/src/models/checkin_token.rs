use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, QueryFilter, QueryOrder};

/// A self-check-in token for one session.
///
/// At most one token per session is active at a time: issuing a new one
/// deactivates all previous tokens for that session. Expiry is lazy, the
/// `expires_at` column is checked on use, never by a background job.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "checkin_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub token: String,
    pub active: bool,
    pub expires_at: DateTime<Utc>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
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

impl Model {
    /// Generates a 64-character hex token from 32 random bytes.
    pub fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Issues a fresh token for a session, deactivating any prior ones first
    /// so that only the newest QR code on screen works.
    pub async fn issue(
        db: &DatabaseConnection,
        session_id: i64,
        created_by: i64,
        valid_minutes: i64,
    ) -> Result<Self, DbErr> {
        Self::deactivate_all(db, session_id).await?;

        let now = Utc::now();
        ActiveModel {
            id: NotSet,
            session_id: Set(session_id),
            token: Set(Self::generate_token()),
            active: Set(true),
            expires_at: Set(now + Duration::minutes(valid_minutes)),
            created_by: Set(created_by),
            created_at: Set(now),
        }
        .insert(db)
        .await
    }

    pub async fn find_by_token(
        db: &DatabaseConnection,
        token: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find().filter(Column::Token.eq(token)).one(db).await
    }

    /// The newest active token for a session, if any. Expiry is not checked
    /// here; callers that care use [`Self::is_usable`].
    pub async fn find_active(
        db: &DatabaseConnection,
        session_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::Active.eq(true))
            .order_by_desc(Column::Id)
            .one(db)
            .await
    }

    /// A token is only usable strictly before `expires_at`; at the expiry
    /// instant itself it is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired_at(now)
    }

    /// Marks this token inactive. Used both on explicit revocation and when
    /// an expired token is presented.
    pub async fn deactivate(self, db: &DatabaseConnection) -> Result<Self, DbErr> {
        let mut active: ActiveModel = self.into();
        active.active = Set(false);
        active.update(db).await
    }

    /// Deactivates every token of a session.
    pub async fn deactivate_all(db: &DatabaseConnection, session_id: i64) -> Result<u64, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::Active, Expr::value(false))
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::Active.eq(true))
            .exec(db)
            .await?;
        Ok(res.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{course, session, user};
    use crate::test_utils::setup_test_db;
    use chrono::TimeZone;

    async fn seed_session(db: &DatabaseConnection) -> session::Model {
        let lecturer = user::Model::upsert(db, "lect1", "Lena Lehr", "lena@test.com", user::Role::Instructor)
            .await
            .unwrap();
        let course = course::Model::get_or_create(db, "K-101", Some("Kurs 101"))
            .await
            .unwrap();
        session::Model::create(
            db,
            course.id,
            lecturer.id,
            "Woche 1",
            "lecture",
            Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 20, 12, 45, 0).unwrap(),
            None,
            None,
            true,
        )
        .await
        .unwrap()
    }

    #[test]
    fn generated_tokens_are_64_hex_chars() {
        let token = Model::generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, Model::generate_token());
    }

    #[tokio::test]
    async fn issuing_deactivates_prior_tokens() {
        let db = setup_test_db().await;
        let session = seed_session(&db).await;

        let first = Model::issue(&db, session.id, session.created_by, 15)
            .await
            .unwrap();
        let second = Model::issue(&db, session.id, session.created_by, 15)
            .await
            .unwrap();

        let reloaded_first = Model::find_by_token(&db, &first.token).await.unwrap().unwrap();
        assert!(!reloaded_first.active);
        assert!(second.active);

        let active = Model::find_active(&db, session.id).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
    }

    #[tokio::test]
    async fn usability_honors_active_flag_and_expiry() {
        let db = setup_test_db().await;
        let session = seed_session(&db).await;

        let token = Model::issue(&db, session.id, session.created_by, 15)
            .await
            .unwrap();

        let now = Utc::now();
        assert!(token.is_usable(now));
        assert!(!token.is_usable(now + Duration::minutes(16)));

        // The expiry instant itself is already past.
        assert!(token.is_usable(token.expires_at - Duration::seconds(1)));
        assert!(!token.is_usable(token.expires_at));

        let revoked = token.deactivate(&db).await.unwrap();
        assert!(!revoked.is_usable(now));
    }
}
