//! Integration tests for the developer endpoints and health check.

use axum::http::StatusCode;

use crate::helpers::{IP_A, TestApp};

#[tokio::test]
async fn test_clear_device_expires_cookie_in_mock_mode() {
    let app = TestApp::new();

    let response = app
        .request_with_cookie("POST", "/api/dev/clear-device", IP_A, "abc")
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);

    let cookie = response.set_cookie.expect("removal cookie");
    assert!(cookie.starts_with("device_id="), "{cookie}");
    assert!(cookie.contains("Max-Age=0"), "{cookie}");
}

#[tokio::test]
async fn test_clear_device_is_forbidden_outside_mock_mode() {
    let app = TestApp::with_config(|config| config.mock_sensor = false);

    let response = app
        .request("POST", "/api/dev/clear-device", None, IP_A)
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.error_code(), "forbidden");
}

#[tokio::test]
async fn test_health_reports_memory_backend() {
    let app = TestApp::new();

    let response = app.request("GET", "/api/health", None, IP_A).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["database"], "not_configured");
    assert_eq!(response.body["mock_sensor"], true);
    assert_eq!(response.body["pending_timers"], 0);
}
