mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, PaginatorTrait};
use serde_json::json;

use db::models::{attendance_record, checkin_token};
use helpers::app::*;

/// One valid token plus a unique roster name match yields exactly one
/// record; repeating the submission is a soft success that leaves the row
/// untouched.
#[tokio::test]
async fn checkin_once_then_already_checked_in() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
    seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(-2),
        Duration::minutes(225),
    )
    .await;

    let response = send(
        &app,
        json(
            "POST",
            &format!("/api/sessions/{}/checkin/token", session.id),
            Some(&bearer),
            json!({}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let issued = body_json(response).await;
    let token = issued["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);
    assert!(
        issued["data"]["checkin_url"]
            .as_str()
            .unwrap()
            .ends_with(&format!("/checkin/{token}"))
    );

    // Name match is trimmed and case-insensitive.
    let response = send(
        &app,
        json(
            "POST",
            "/checkin/submit",
            None,
            json!({ "token": token, "student_name": "  max MUSTER " }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["already_checked_in"], false);
    assert_eq!(body["data"]["status"], "present");

    let record = attendance_record::Model::find_for_student(&db, session.id, "stud1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.recorded_by, "self-checkin");
    assert_eq!(record.minutes, 225);

    // Second submission: soft duplicate, nothing rewritten.
    let response = send(
        &app,
        json(
            "POST",
            "/checkin/submit",
            None,
            json!({ "token": token, "student_name": "Max Muster" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["already_checked_in"], true);

    let unchanged = attendance_record::Model::find_for_student(&db, session.id, "stud1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged, record);
    assert_eq!(
        attendance_record::Entity::find().count(&db).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn expired_token_is_rejected_and_deactivated() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
    seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(-30),
        Duration::minutes(90),
    )
    .await;

    let token = checkin_token::Model::issue(&db, session.id, lecturer.id, 15)
        .await
        .unwrap();
    // Backdate the expiry; the active flag stays on until someone presents
    // the token.
    let mut backdated: checkin_token::ActiveModel = token.clone().into();
    backdated.expires_at = Set(Utc::now() - Duration::minutes(1));
    backdated.update(&db).await.unwrap();

    let response = send(
        &app,
        json(
            "POST",
            "/checkin/submit",
            None,
            json!({ "token": token.token, "student_name": "Max Muster" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::GONE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["code"], "token_expired");

    // Nothing was written, and the deactivation is visible in the status
    // endpoint.
    assert_eq!(
        attendance_record::Entity::find().count(&db).await.unwrap(),
        0
    );
    let response = send(
        &app,
        get(
            &format!("/api/sessions/{}/checkin/status", session.id),
            Some(&bearer),
        ),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["active"], false);
}

#[tokio::test]
async fn unknown_name_and_email_write_nothing() {
    let (app, db) = make_test_app().await;
    let (lecturer, _) = seed_instructor(&db).await;
    seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(0),
        Duration::minutes(90),
    )
    .await;
    let token = checkin_token::Model::issue(&db, session.id, lecturer.id, 15)
        .await
        .unwrap();

    let response = send(
        &app,
        json(
            "POST",
            "/checkin/submit",
            None,
            json!({
                "token": token.token,
                "student_name": "Maxi Mustermann",
                "student_email": "nobody@uni.example",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["data"]["code"], "not_registered");
    assert_eq!(
        attendance_record::Entity::find().count(&db).await.unwrap(),
        0
    );
}

/// An instructor on the roster is not an eligible check-in target even with
/// a perfectly matching name.
#[tokio::test]
async fn instructor_name_cannot_self_check_in() {
    let (app, db) = make_test_app().await;
    let (lecturer, _) = seed_instructor(&db).await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(0),
        Duration::minutes(90),
    )
    .await;
    let token = checkin_token::Model::issue(&db, session.id, lecturer.id, 15)
        .await
        .unwrap();

    let response = send(
        &app,
        json(
            "POST",
            "/checkin/submit",
            None,
            json!({ "token": token.token, "student_name": "Lena Lehr" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn grace_period_decides_present_versus_late() {
    let (app, db) = make_test_app().await;
    let (lecturer, _) = seed_instructor(&db).await;
    seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;
    seed_student(&db, "stud2", "Mia Beispiel", "mia@uni.example").await;
    let course = seed_course(&db, "K-101").await;

    // Scan 4 minutes after the start: still within the grace period.
    let on_time = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(-4),
        Duration::minutes(90),
    )
    .await;
    let token = checkin_token::Model::issue(&db, on_time.id, lecturer.id, 15)
        .await
        .unwrap();
    let response = send(
        &app,
        json(
            "POST",
            "/checkin/submit",
            None,
            json!({ "token": token.token, "student_name": "Max Muster" }),
        ),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "present");

    // Scan 6 minutes after the start: late.
    let late = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(-6),
        Duration::minutes(90),
    )
    .await;
    let token = checkin_token::Model::issue(&db, late.id, lecturer.id, 15)
        .await
        .unwrap();
    let response = send(
        &app,
        json(
            "POST",
            "/checkin/submit",
            None,
            json!({ "token": token.token, "student_name": "Mia Beispiel" }),
        ),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "late");
}

#[tokio::test]
async fn token_probe_reports_session_and_rejects_garbage() {
    let (app, db) = make_test_app().await;
    let (lecturer, _) = seed_instructor(&db).await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(0),
        Duration::minutes(90),
    )
    .await;
    let token = checkin_token::Model::issue(&db, session.id, lecturer.id, 15)
        .await
        .unwrap();

    let response = send(&app, get(&format!("/checkin/{}", token.token), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["session_title"], "Woche 1");
    assert_eq!(body["data"]["location"], "H 1.01");

    let response = send(&app, get("/checkin/deadbeef", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["data"]["code"], "token_invalid");
}
