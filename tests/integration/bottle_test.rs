//! Integration tests for bottle credit, activation and expiry.

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use crate::helpers::{IP_A, IP_B, TestApp};

#[tokio::test]
async fn test_bottles_accumulate_before_activation() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;

    let first = app.bottle(id).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["bottles_inserted"], 1);
    assert_eq!(first.body["seconds_earned"], 120);
    assert_eq!(first.body["minutes_earned"], 2);
    assert!(first.body["session_end"].is_null());

    let second = app.bottle(id).await;
    assert_eq!(second.body["bottles_inserted"], 2);
    assert_eq!(second.body["seconds_earned"], 240);
    assert_eq!(second.body["status"], "inserting");
}

#[tokio::test]
async fn test_sensor_hit_counts_like_a_bottle() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;

    let response = app
        .request("POST", "/sensor/hit", Some(json!({ "session_id": id })), IP_A)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["bottles_inserted"], 1);
}

#[tokio::test]
async fn test_bottle_without_session_id_is_rejected() {
    let app = TestApp::new();

    let empty = app.request("POST", "/api/bottle", None, IP_A).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.error_code(), "validation_error");

    let missing = app
        .request("POST", "/sensor/hit", Some(json!({ "session_id": 404 })), IP_A)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_activation_grants_earned_time() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;
    app.bottle(id).await;
    app.bottle(id).await;

    let response = app
        .request("POST", &format!("/api/session/{id}/activate"), None, IP_A)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "active");
    assert_eq!(response.body["remaining_seconds"], 240);
    assert!(response.body["session_end"].is_string());
    assert_eq!(app.enforcer.grants(), vec![(IP_A.to_string(), 240)]);

    // Activation frees the insertion slot for the next device.
    app.claim(IP_B).await;

    // A second activation is an invalid transition.
    let again = app
        .request("POST", &format!("/api/session/{id}/activate"), None, IP_A)
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.error_code(), "invalid_transition");
    assert_eq!(app.enforcer.grants().len(), 1);
}

#[tokio::test]
async fn test_expire_is_idempotent_and_revokes_once() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;
    app.bottle(id).await;
    app.request("POST", &format!("/api/session/{id}/activate"), None, IP_A)
        .await;

    let path = format!("/api/session/{id}/expire");
    let first = app.request("POST", &path, None, IP_A).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["status"], "expired");
    assert_eq!(first.body["remaining_seconds"], 0);

    let second = app.request("POST", &path, None, IP_A).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["status"], "expired");

    assert_eq!(app.enforcer.revokes(), vec![IP_A.to_string()]);
    assert_eq!(app.controller.scheduler().pending(), 0);

    let late = app.bottle(id).await;
    assert_eq!(late.status, StatusCode::BAD_REQUEST);
    assert_eq!(late.error_code(), "session_not_accepting");
}

#[tokio::test(start_paused = true)]
async fn test_full_insertion_scenario() {
    let app = TestApp::new();

    // A claims and inserts two bottles; B is turned away meanwhile.
    let id = app.claim(IP_A).await;
    app.bottle(id).await;
    app.bottle(id).await;

    let busy = app.request("POST", "/api/session/create", None, IP_B).await;
    assert_eq!(busy.status, StatusCode::CONFLICT);

    let active = app
        .request("POST", &format!("/api/session/{id}/activate"), None, IP_A)
        .await;
    assert_eq!(active.body["remaining_seconds"], 240);
    assert_eq!(app.enforcer.grants(), vec![(IP_A.to_string(), 240)]);

    // One more bottle while active extends the end by 120 seconds.
    tokio::time::sleep(Duration::from_secs(60)).await;
    let extended = app
        .request("POST", "/sensor/hit", Some(json!({ "session_id": id })), IP_A)
        .await;
    assert_eq!(extended.status, StatusCode::OK);
    assert_eq!(extended.body["status"], "active");
    assert_eq!(extended.body["bottles_inserted"], 3);
    assert_eq!(
        app.enforcer.grants().last(),
        Some(&(IP_A.to_string(), 300))
    );
    assert_eq!(app.controller.scheduler().pending(), 1);

    // The original end passes without expiring the session.
    tokio::time::sleep(Duration::from_secs(200)).await;
    let status = app
        .request("GET", &format!("/api/session/{id}/status"), None, IP_A)
        .await;
    assert_eq!(status.body["status"], "active");
    assert_eq!(status.body["remaining_seconds"], 100);
    assert!(app.enforcer.revokes().is_empty());

    tokio::time::sleep(Duration::from_secs(101)).await;
    let status = app
        .request("GET", &format!("/api/session/{id}/status"), None, IP_A)
        .await;
    assert_eq!(status.body["status"], "expired");
    assert_eq!(app.enforcer.revokes(), vec![IP_A.to_string()]);
    assert_eq!(app.controller.scheduler().pending(), 0);
}
