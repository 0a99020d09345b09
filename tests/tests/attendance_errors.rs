//! Error responses: each rejection maps to its status, code, and kind.

use axum::http::StatusCode;
use integration_tests::fixtures::{at, ALICE, BOB, LECTURE_ID, MALLORY};
use integration_tests::setup::{request_token, send_heartbeat, token_for, TestContext};

fn assert_error(body: &serde_json::Value, code: &str, kind: &str) {
    assert_eq!(body["code"], code, "unexpected code in {}", body);
    assert_eq!(body["kind"], kind, "unexpected kind in {}", body);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
}

/// Missing identity header returns AUTH_001
#[tokio::test]
async fn test_missing_identity_returns_401() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server
        .post(&format!("/lectures/{}/attendance-token", LECTURE_ID))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "AUTH_001");
}

#[tokio::test]
async fn test_non_numeric_identity_returns_401() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server
        .post(&format!("/lectures/{}/attendance-token", LECTURE_ID))
        .add_header("X-Student-Id", "alice")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "AUTH_001");
}

#[tokio::test]
async fn test_unknown_lecture_returns_404() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = request_token(&server, 404, ALICE).await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_error(&response.json(), "ATT_001", "not_found");

    let response = server.get("/lectures/404/attendance").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.post("/lectures/404/finalize").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

/// Token requests outside [starts_at, ends_at] are rejected.
#[tokio::test]
async fn test_token_outside_window_returns_422() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    ctx.set_time(at(8, 59));
    let response = request_token(&server, LECTURE_ID, ALICE).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&response.json(), "ATT_002", "out_of_window");

    ctx.set_time(at(11, 0));
    request_token(&server, LECTURE_ID, ALICE)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_unenrolled_student_returns_403() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = request_token(&server, LECTURE_ID, MALLORY).await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_error(&response.json(), "ATT_003", "not_enrolled");
}

#[tokio::test]
async fn test_tampered_token_returns_401() {
    let ctx = TestContext::new().await;
    let server = ctx.server();
    let token = token_for(&server, ALICE).await;

    let mut tampered = token.into_bytes();
    let last = tampered.len() - 1;
    tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let response = send_heartbeat(&server, ALICE, &tampered).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_error(&response.json(), "ATT_004", "invalid_token");

    let response = send_heartbeat(&server, ALICE, "not-a-token").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_error(&response.json(), "ATT_004", "invalid_token");
}

/// A token presented by another student is rejected and nothing is written.
#[tokio::test]
async fn test_borrowed_token_returns_403() {
    let ctx = TestContext::new().await;
    let server = ctx.server();
    let token = token_for(&server, ALICE).await;

    let response = send_heartbeat(&server, BOB, &token).await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_error(&response.json(), "ATT_005", "token_mismatch");

    let report: serde_json::Value = server
        .get(&format!("/lectures/{}/attendance", LECTURE_ID))
        .await
        .json();
    assert!(report["records"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_token_returns_401() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    ctx.set_time(at(9, 0));
    let token = token_for(&server, ALICE).await;

    // Still valid at exactly the expiry second.
    ctx.set_time(at(9, 10));
    send_heartbeat(&server, ALICE, &token)
        .await
        .assert_status_ok();

    ctx.set_time(at(9, 10) + chrono::Duration::seconds(1));
    let response = send_heartbeat(&server, ALICE, &token).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_error(&response.json(), "ATT_006", "token_expired");
}

/// A valid token cannot be used once the lecture is over.
#[tokio::test]
async fn test_heartbeat_after_end_returns_422() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    ctx.set_time(at(10, 58));
    let token = token_for(&server, ALICE).await;

    ctx.set_time(at(11, 1));
    let response = send_heartbeat(&server, ALICE, &token).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_error(&response.json(), "ATT_007", "lecture_not_active");
}

#[tokio::test]
async fn test_malformed_heartbeat_body_returns_400() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server
        .post("/attendance/heartbeat")
        .add_header("X-Student-Id", "7")
        .json(&serde_json::json!({ "tok": "x" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "VALID_001");
}
