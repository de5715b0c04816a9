mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use db::models::attendance_record;
use helpers::app::*;

#[tokio::test]
async fn create_session_derives_expected_minutes() {
    let (app, db) = make_test_app().await;
    let (_, bearer) = seed_instructor(&db).await;

    let start = Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 1, 20, 12, 45, 0).unwrap();
    let response = send(
        &app,
        json(
            "POST",
            "/api/courses/K-101/sessions",
            Some(&bearer),
            json!({
                "title": "Woche 1",
                "start_ts": start.to_rfc3339(),
                "end_ts": end.to_rfc3339(),
                "location": "H 1.01",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["expected_minutes"], 225);
    assert_eq!(body["data"]["session_type"], "regular");
    assert_eq!(body["data"]["mandatory"], true);

    // The course was created lazily and lists the session newest-first.
    let response = send(&app, get("/api/courses/K-101/sessions", Some(&bearer))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_session_rejects_bad_input_and_non_instructors() {
    let (app, db) = make_test_app().await;
    let (_, bearer) = seed_instructor(&db).await;
    let (_, student_bearer) = seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;

    let start = Utc.with_ymd_and_hms(2026, 1, 20, 9, 0, 0).unwrap();

    // end before start
    let response = send(
        &app,
        json(
            "POST",
            "/api/courses/K-101/sessions",
            Some(&bearer),
            json!({
                "title": "Woche 1",
                "start_ts": start.to_rfc3339(),
                "end_ts": (start - Duration::hours(1)).to_rfc3339(),
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // students cannot create sessions
    let response = send(
        &app,
        json(
            "POST",
            "/api/courses/K-101/sessions",
            Some(&student_bearer),
            json!({
                "title": "Woche 1",
                "start_ts": start.to_rfc3339(),
                "end_ts": (start + Duration::hours(1)).to_rfc3339(),
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // no token at all
    let response = send(
        &app,
        json("POST", "/api/courses/K-101/sessions", None, json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn edit_recomputes_window_and_delete_cascades() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(0),
        Duration::minutes(90),
    )
    .await;

    let new_end = session.start_ts + Duration::minutes(120);
    let response = send(
        &app,
        json(
            "PUT",
            &format!("/api/sessions/{}", session.id),
            Some(&bearer),
            json!({ "end_ts": new_end.to_rfc3339(), "title": "Woche 1 (verlegt)" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["expected_minutes"], 120);
    assert_eq!(body["data"]["title"], "Woche 1 (verlegt)");

    let response = send(
        &app,
        delete(&format!("/api/sessions/{}", session.id), Some(&bearer)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        get(&format!("/api/sessions/{}", session.id), Some(&bearer)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Property: re-issuing leaves only the newest token active, and revoking
/// kills that one too.
#[tokio::test]
async fn reissue_keeps_only_newest_token_and_revoke_clears_it() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(0),
        Duration::minutes(90),
    )
    .await;
    let token_uri = format!("/api/sessions/{}/checkin/token", session.id);

    let first = body_json(send(&app, json("POST", &token_uri, Some(&bearer), json!({}))).await)
        .await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    let second = body_json(send(&app, json("POST", &token_uri, Some(&bearer), json!({}))).await)
        .await["data"]["token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(first, second);

    // The old QR code no longer probes.
    let response = send(&app, get(&format!("/checkin/{first}"), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let status = body_json(
        send(
            &app,
            get(
                &format!("/api/sessions/{}/checkin/status", session.id),
                Some(&bearer),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(status["data"]["active"], true);
    assert_eq!(status["data"]["token"], second.as_str());

    let response = send(
        &app,
        delete(
            &format!("/api/sessions/{}/checkin", session.id),
            Some(&bearer),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(
        send(
            &app,
            get(
                &format!("/api/sessions/{}/checkin/status", session.id),
                Some(&bearer),
            ),
        )
        .await,
    )
    .await;
    assert_eq!(status["data"]["active"], false);
}

/// Property: a 09:00-12:45 session with a 15 minute break nets 210 minutes.
#[tokio::test]
async fn manual_mark_nets_minutes_after_break() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
    seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(0),
        Duration::minutes(225),
    )
    .await;

    let response = send(
        &app,
        json(
            "POST",
            &format!("/api/sessions/{}/attendance", session.id),
            Some(&bearer),
            json!({
                "student_id": "stud1",
                "status": "present",
                "present_from": session.start_ts.to_rfc3339(),
                "present_to": session.end_ts.to_rfc3339(),
                "break_minutes": 15,
                "note": "Pause abgezogen",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["minutes"], 225);
    assert_eq!(body["data"]["net_minutes"], 210);
    assert_eq!(body["data"]["recorded_by"], "lect1");
}

#[tokio::test]
async fn manual_mark_requires_window_only_for_attended_statuses() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
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
    let uri = format!("/api/sessions/{}/attendance", session.id);

    // present without a window is invalid
    let response = send(
        &app,
        json(
            "POST",
            &uri,
            Some(&bearer),
            json!({ "student_id": "stud1", "status": "present" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // absent without a window is fine and carries zero minutes
    let response = send(
        &app,
        json(
            "POST",
            &uri,
            Some(&bearer),
            json!({ "student_id": "stud1", "status": "absent" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "absent");
    assert_eq!(body["data"]["net_minutes"], 0);
}

#[tokio::test]
async fn bulk_mark_writes_one_record_per_student() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
    seed_student(&db, "stud1", "Max Muster", "max@uni.example").await;
    seed_student(&db, "stud2", "Mia Beispiel", "mia@uni.example").await;
    seed_student(&db, "stud3", "Ben Probe", "ben@uni.example").await;
    let course = seed_course(&db, "K-101").await;
    let session = seed_session(
        &db,
        course.id,
        lecturer.id,
        Duration::minutes(0),
        Duration::minutes(90),
    )
    .await;

    let response = send(
        &app,
        json(
            "POST",
            &format!("/api/sessions/{}/attendance/bulk", session.id),
            Some(&bearer),
            json!({
                "student_ids": ["stud1", "stud2", "stud3"],
                "status": "present",
                "present_from": session.start_ts.to_rfc3339(),
                "present_to": session.end_ts.to_rfc3339(),
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["marked"], 3);
    assert_eq!(body["data"]["failed"], 0);

    let records = attendance_record::Model::list_for_session(&db, session.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn ledger_lists_every_roster_student_and_exports_csv() {
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
        "stud1",
        attendance_record::AttendanceStatus::Present,
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
        get(
            &format!("/api/sessions/{}/attendance", session.id),
            Some(&bearer),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    // Roster students without a record still get a row.
    let mia = rows.iter().find(|r| r["student_id"] == "stud2").unwrap();
    assert!(mia["record"].is_null());

    let response = send(
        &app,
        get(
            &format!("/api/sessions/{}/attendance/export", session.id),
            Some(&bearer),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/csv; charset=utf-8"
    );
    let csv = body_text(response).await;
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "name,email,status,present_from,present_to,minutes,break_minutes,net_minutes,hours,note"
    );
    assert!(csv.contains("Max Muster,max@uni.example,present"));
}

#[tokio::test]
async fn attendance_record_can_be_deleted() {
    let (app, db) = make_test_app().await;
    let (lecturer, bearer) = seed_instructor(&db).await;
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

    let record = attendance_record::Model::upsert_manual(
        &db,
        session.id,
        "stud1",
        attendance_record::AttendanceStatus::Late,
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
        delete(&format!("/api/attendance/{}", record.id), Some(&bearer)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(
        &app,
        delete(&format!("/api/attendance/{}", record.id), Some(&bearer)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
