mod helpers;

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

use db::models::attendance_record::{self, AttendanceStatus};
use helpers::app::*;

/// Property: a course with zero sessions reports a 0.0 attendance rate
/// instead of dividing by zero.
#[tokio::test]
async fn stats_for_empty_course_are_all_zero() {
    let (app, db) = make_test_app().await;
    let (_, _) = seed_instructor(&db).await;
    let (_, student_bearer) = seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;

    let response = send(
        &app,
        get("/api/courses/K-101/me/stats", Some(&student_bearer)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["stats"]["total_sessions"], 0);
    assert_eq!(body["data"]["stats"]["attendance_rate"], 0.0);
    assert_eq!(body["data"]["stats"]["time_rate"], 0.0);
    assert_eq!(body["data"]["stats"]["total_hours"], 0.0);
}

#[tokio::test]
async fn student_stats_aggregate_across_sessions() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
    seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;
    let course = seed_course(&db, "K-101").await;

    // Three sessions of 225 planned minutes each; two attended.
    let mut sessions = Vec::new();
    for week in 0..3 {
        sessions.push(
            seed_session(
                &db,
                course.id,
                lecturer.id,
                Duration::days(week) - Duration::days(21),
                Duration::minutes(225),
            )
            .await,
        );
    }
    attendance_record::Model::upsert_manual(
        &db,
        sessions[0].id,
        "stud1",
        AttendanceStatus::Present,
        Some(sessions[0].start_ts),
        Some(sessions[0].end_ts),
        225,
        0,
        None,
        "lect1",
    )
    .await
    .unwrap();
    attendance_record::Model::upsert_manual(
        &db,
        sessions[1].id,
        "stud1",
        AttendanceStatus::Late,
        Some(sessions[1].start_ts),
        Some(sessions[1].end_ts),
        225,
        15,
        None,
        "lect1",
    )
    .await
    .unwrap();

    let response = send(
        &app,
        get("/api/courses/K-101/students/stud1/stats", Some(&bearer)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let stats = &body["data"]["stats"];
    assert_eq!(stats["total_sessions"], 3);
    assert_eq!(stats["attended_sessions"], 2);
    assert_eq!(stats["total_minutes"], 435);
    assert_eq!(stats["expected_minutes"], 675);
    assert_eq!(stats["total_hours"], 7.25);
    assert_eq!(stats["attendance_rate"], 66.7);
    assert_eq!(stats["time_rate"], 64.4);

    // Per-session list is chronological and carries the missing third row.
    let rows = body["data"]["sessions"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["status"], "present");
    assert_eq!(rows[1]["status"], "late");
    assert!(rows[2]["status"].is_null());
}

#[tokio::test]
async fn overview_crosses_roster_with_sessions() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
    seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;
    seed_student(&db, "stud2", "Mia Beispiel", "mia@uni.example").await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(0),
        Duration::minutes(90),
    )
    .await;

    attendance_record::Model::upsert_manual(
        &db,
        session.id,
        "stud2",
        AttendanceStatus::Present,
        Some(session.start_ts),
        Some(session.end_ts),
        90,
        0,
        None,
        "lect1",
    )
    .await
    .unwrap();

    let response = send(&app, get("/api/courses/K-101/overview", Some(&bearer))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let rows = body["data"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);

    let max = rows.iter().find(|r| r["student_id"] == "stud1").unwrap();
    assert!(max["statuses"][0].is_null());
    assert_eq!(max["stats"]["attendance_rate"], 0.0);

    let mia = rows.iter().find(|r| r["student_id"] == "stud2").unwrap();
    assert_eq!(mia["statuses"][0], "present");
    assert_eq!(mia["stats"]["attendance_rate"], 100.0);

    // CSV flavour of the same matrix.
    let response = send(
        &app,
        get("/api/courses/K-101/overview/export", Some(&bearer)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let csv = body_text(response).await;
    assert!(csv.starts_with("name,email,"));
    assert!(csv.contains("Mia Beispiel,mia@uni.example,present,100,1.5"));
}

#[tokio::test]
async fn overview_of_unknown_course_is_not_found() {
    let (app, db) = make_test_app().await;
    let (_, bearer) = seed_instructor(&db).await;

    let response = send(&app, get("/api/courses/NOPE/overview", Some(&bearer))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn roster_listing_and_sync_without_lms_token() {
    let (app, db) = make_test_app().await;
    let (_, bearer) = seed_instructor(&db).await;
    seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;

    let response = send(&app, get("/api/courses/K-101/roster", Some(&bearer))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let roster = body["data"].as_array().unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0]["external_id"], "stud1");

    // No LMS credentials configured: the sync is a logged no-op.
    let response = send(
        &app,
        json("POST", "/api/courses/K-101/roster/sync", Some(&bearer), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["synced"], 0);
}

#[tokio::test]
async fn certificate_payload_carries_totals_and_rows() {
    let (app, db) = make_test_app().await;
    let (lecturer, _) = seed_instructor(&db).await;
    let (_, student_bearer) = seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(0),
        Duration::minutes(90),
    )
    .await;
    attendance_record::Model::upsert_manual(
        &db,
        session.id,
        "stud1",
        AttendanceStatus::Present,
        Some(session.start_ts),
        Some(session.end_ts),
        90,
        0,
        None,
        "lect1",
    )
    .await
    .unwrap();

    let response = send(
        &app,
        get("/api/courses/K-101/me/certificate", Some(&student_bearer)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["student"]["name"], "Max Muster");
    assert_eq!(body["data"]["course"]["lms_course_id"], "K-101");
    assert_eq!(body["data"]["totals"]["attended_sessions"], 1);
    assert_eq!(body["data"]["sessions"][0]["net_minutes"], 90);
}
