use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use chrono::{DateTime, Duration, Utc};
use ctor::{ctor, dtor};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use std::convert::Infallible;
use tower::ServiceExt;
use tower::util::BoxCloneService;

use api::routes::{checkin::checkin_routes, routes};
use db::models::{course, session, user};
use util::state::AppState;

#[ctor]
fn setup_tests() {
    // AppConfig reads these on first touch; tests never hit a file DB but
    // the config loader insists on the required values.
    unsafe {
        std::env::set_var("DATABASE_PATH", "sqlite::memory:");
        std::env::set_var("JWT_SECRET", "test-secret");
        std::env::set_var("STORAGE_ROOT", "./tmp-test-storage");
    }
}

#[dtor]
fn cleanup_tests() {
    let _ = std::fs::remove_dir_all("./tmp-test-storage");
}

pub type TestApp = BoxCloneService<Request<Body>, Response<axum::body::Body>, Infallible>;

/// Builds the full router over a fresh in-memory database.
pub async fn make_test_app() -> (TestApp, DatabaseConnection) {
    let db = db::test_utils::setup_test_db().await;
    let state = AppState::new(db.clone());

    let router: Router = Router::new()
        .nest("/api", routes(state.clone()))
        .nest("/checkin", checkin_routes(state));

    (router.into_service().boxed_clone(), db)
}

pub async fn seed_instructor(db: &DatabaseConnection) -> (user::Model, String) {
    let lecturer = user::Model::upsert(
        db,
        "lect1",
        "Lena Lehr",
        "lena.lehr@hochschule.example",
        user::Role::Instructor,
    )
    .await
    .unwrap();
    let (token, _) = api::auth::generate_jwt(lecturer.id);
    (lecturer, token)
}

pub async fn seed_student(
    db: &DatabaseConnection,
    external_id: &str,
    name: &str,
    email: &str,
) -> (user::Model, String) {
    let student = user::Model::upsert(db, external_id, name, email, user::Role::Student)
        .await
        .unwrap();
    let (token, _) = api::auth::generate_jwt(student.id);
    (student, token)
}

pub async fn seed_course(db: &DatabaseConnection, lms_course_id: &str) -> course::Model {
    course::Model::get_or_create(db, lms_course_id, Some("Testkurs"))
        .await
        .unwrap()
}

/// Creates a session starting `start_offset` relative to now with the given
/// duration.
pub async fn seed_session(
    db: &DatabaseConnection,
    course_id: i64,
    created_by: i64,
    start_offset: Duration,
    duration: Duration,
) -> session::Model {
    let start: DateTime<Utc> = Utc::now() + start_offset;
    session::Model::create(
        db,
        course_id,
        created_by,
        "Woche 1",
        "lecture",
        start,
        start + duration,
        Some("H 1.01"),
        None,
        true,
    )
    .await
    .unwrap()
}

pub fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json(method: &str, uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn delete(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &TestApp, req: Request<Body>) -> Response<axum::body::Body> {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn body_json(response: Response<axum::body::Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<axum::body::Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
