//! Tests for health check endpoints.

use axum::http::StatusCode;
use integration_tests::setup::TestContext;

#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["store_connected"], true);
    assert!(body["report"]["components"].is_array());
    assert!(body["metrics"]["heartbeats_accepted"].is_u64());

    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "degraded",
        "store is up, so status should be serving, got '{}'",
        status
    );
}

#[tokio::test]
async fn test_ready_endpoint() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server.get("/health/ready").await;
    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn test_live_endpoint() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    let response = server.get("/health/live").await;
    response.assert_status(StatusCode::OK);
}

/// Health endpoints do not need the identity header.
#[tokio::test]
async fn test_health_endpoints_no_identity_required() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    for path in ["/health", "/health/ready", "/health/live"] {
        let response = server.get(path).await;
        assert_ne!(
            response.status_code(),
            StatusCode::UNAUTHORIZED,
            "{} should not require identity",
            path
        );
    }
}
