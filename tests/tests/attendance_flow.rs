//! End-to-end attendance flow over HTTP: token, heartbeats, finalization,
//! and the attendance report.

use axum::http::StatusCode;
use chrono::Duration;
use integration_tests::fixtures::{self, at, ALICE, BOB, CAROL, LECTURE_ID};
use integration_tests::setup::{request_token, send_heartbeat, token_for, TestContext};

/// Token response carries the token and an expiry ten minutes out.
#[tokio::test]
async fn test_issue_token() {
    let ctx = TestContext::new().await;
    ctx.set_time(at(9, 2));
    let server = ctx.server();

    let response = request_token(&server, LECTURE_ID, ALICE).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert!(!body["token"].as_str().unwrap().is_empty());
    assert_eq!(body["expires_at"], "2026-03-02T09:12:00Z");
}

/// Heartbeats update last_seen and mark the student present before finalization.
#[tokio::test]
async fn test_heartbeat_marks_present() {
    let ctx = TestContext::new().await;
    ctx.set_time(at(9, 1));
    let server = ctx.server();
    let token = token_for(&server, ALICE).await;

    let response = send_heartbeat(&server, ALICE, &token).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["lecture_id"], LECTURE_ID);
    assert_eq!(body["last_seen_at"], "2026-03-02T09:01:00Z");

    ctx.set_time(at(9, 4));
    let body: serde_json::Value = send_heartbeat(&server, ALICE, &token).await.json();
    assert_eq!(body["last_seen_at"], "2026-03-02T09:04:00Z");

    let report: serde_json::Value = server
        .get(&format!("/lectures/{}/attendance", LECTURE_ID))
        .await
        .json();
    let records = report["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["student_id"], ALICE);
    assert_eq!(records[0]["status"], "present");
    assert_eq!(records[0]["checked_in_at"], "2026-03-02T09:01:00Z");
    assert!(records[0]["minutes_attended"].is_null());
}

/// Drive a whole lecture: Alice stays throughout, Bob shows up after 9:25,
/// Carol never shows. Each beat uses a fresh token.
async fn run_lecture(ctx: &TestContext) {
    let server = ctx.server();
    let minutes = (0..=120).step_by(9).chain(std::iter::once(120));

    for minute in minutes {
        ctx.set_time(at(9, 0) + Duration::minutes(minute));

        for student in [ALICE, BOB] {
            if student == BOB && minute < 25 {
                continue;
            }
            let token = token_for(&server, student).await;
            send_heartbeat(&server, student, &token)
                .await
                .assert_status_ok();
        }
    }
}

#[tokio::test]
async fn test_finalize_classifies_roster() {
    let ctx = TestContext::new().await;
    run_lecture(&ctx).await;
    let server = ctx.server();

    ctx.set_time(at(11, 5));
    let response = server
        .post(&format!("/lectures/{}/finalize", LECTURE_ID))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["finalized_count"], 3);

    let report: serde_json::Value = server
        .get(&format!("/lectures/{}/attendance", LECTURE_ID))
        .await
        .json();
    let records = report["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);

    // Alice: joined 9:00, last seen 11:00.
    assert_eq!(records[0]["student_id"], ALICE);
    assert_eq!(records[0]["status"], "present");
    assert_eq!(records[0]["minutes_attended"], 120);

    // Bob: first beat at 9:27, after the 10 minute grace.
    assert_eq!(records[1]["student_id"], BOB);
    assert_eq!(records[1]["status"], "late");
    assert_eq!(records[1]["checked_in_at"], "2026-03-02T09:27:00Z");
    assert_eq!(records[1]["minutes_attended"], 93);

    assert_eq!(records[2]["student_id"], CAROL);
    assert_eq!(records[2]["status"], "absent");
    assert!(records[2]["checked_in_at"].is_null());

    assert_eq!(report["summary"]["present"], 1);
    assert_eq!(report["summary"]["late"], 1);
    assert_eq!(report["summary"]["absent"], 1);
    assert_eq!(report["summary"]["left"], 0);
}

/// Finalizing twice with the same clock yields the same ledger.
#[tokio::test]
async fn test_finalize_is_idempotent() {
    let ctx = TestContext::new().await;
    run_lecture(&ctx).await;
    let server = ctx.server();
    ctx.set_time(at(11, 5));

    let path = format!("/lectures/{}/finalize", LECTURE_ID);
    let report_path = format!("/lectures/{}/attendance", LECTURE_ID);

    server.post(&path).await.assert_status_ok();
    let first: serde_json::Value = server.get(&report_path).await.json();
    server.post(&path).await.assert_status_ok();
    let second: serde_json::Value = server.get(&report_path).await.json();

    assert_eq!(first, second);
}

/// A student who stops sending heartbeats well before the end is marked left.
#[tokio::test]
async fn test_silent_student_is_left() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    ctx.set_time(at(9, 0));
    let token = token_for(&server, ALICE).await;
    send_heartbeat(&server, ALICE, &token).await.assert_status_ok();
    ctx.set_time(at(9, 5));
    send_heartbeat(&server, ALICE, &token).await.assert_status_ok();

    ctx.set_time(at(11, 1));
    server
        .post(&format!("/lectures/{}/finalize", LECTURE_ID))
        .await
        .assert_status_ok();

    let report: serde_json::Value = server
        .get(&format!("/lectures/{}/attendance", LECTURE_ID))
        .await
        .json();
    let alice = &report["records"][0];
    assert_eq!(alice["status"], "left");
    assert_eq!(alice["minutes_attended"], 5);
}

/// The same flow against SQLite.
#[tokio::test]
async fn test_flow_on_sqlite() {
    let ctx = TestContext::with_sqlite().await;
    let server = ctx.server();

    ctx.set_time(at(10, 55));
    let token = token_for(&server, BOB).await;
    send_heartbeat(&server, BOB, &token).await.assert_status_ok();
    ctx.set_time(at(11, 0));
    send_heartbeat(&server, BOB, &token).await.assert_status_ok();

    ctx.set_time(at(11, 2));
    let body: serde_json::Value = server
        .post(&format!("/lectures/{}/finalize", LECTURE_ID))
        .await
        .json();
    assert_eq!(body["finalized_count"], fixtures::roster().len());

    let report: serde_json::Value = server
        .get(&format!("/lectures/{}/attendance", LECTURE_ID))
        .await
        .json();
    assert_eq!(report["summary"]["late"], 1);
    assert_eq!(report["summary"]["absent"], 2);
    assert_eq!(report["records"][1]["minutes_attended"], 5);

    let response = send_heartbeat(&server, BOB, &token).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}
