//! Integration tests for the insertion slot and portal lookup.

use axum::http::StatusCode;
use serde_json::json;

use crate::helpers::{IP_A, IP_B, IP_UNKNOWN, MAC_A, TestApp};

#[tokio::test]
async fn test_insertion_slot_is_exclusive() {
    let app = TestApp::new();

    let first = app.request("POST", "/api/session/create", None, IP_A).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["success"], true);
    assert_eq!(first.body["status"], "inserting");

    let busy = app.request("POST", "/api/session/create", None, IP_B).await;
    assert_eq!(busy.status, StatusCode::CONFLICT);
    assert_eq!(busy.body["success"], false);
    assert_eq!(busy.error_code(), "machine_busy");

    // Claiming again from the holder is still busy: there is one slot.
    let again = app.request("POST", "/api/session/create", None, IP_A).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test(start_paused = true)]
async fn test_create_with_live_access_returns_active_session() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;
    app.bottle(id).await;
    app.request("POST", &format!("/api/session/{id}/activate"), None, IP_A)
        .await;

    let again = app.request("POST", "/api/session/create", None, IP_A).await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(again.body["status"], "active");
    assert_eq!(again.session_id(), id);

    let extended = app.bottle(id).await;
    assert_eq!(extended.body["status"], "active");
    assert_eq!(extended.body["bottles_inserted"], 2);

    // Another device can still use the machine.
    app.claim(IP_B).await;
}

#[tokio::test]
async fn test_unlock_frees_the_slot() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;

    // Only the holder can release it.
    let other = app.request("POST", "/api/session/unlock", None, IP_B).await;
    assert_eq!(other.status, StatusCode::OK);
    assert_eq!(other.body["released"], false);

    let unlock = app.request("POST", "/api/session/unlock", None, IP_A).await;
    assert_eq!(unlock.status, StatusCode::OK);
    assert_eq!(unlock.body["released"], true);
    assert_eq!(unlock.body["session_id"], id);

    let status = app
        .request("GET", &format!("/api/session/{id}/status"), None, IP_A)
        .await;
    assert_eq!(status.body["status"], "awaiting_insertion");

    app.claim(IP_B).await;
}

#[tokio::test]
async fn test_lookup_creates_then_resumes() {
    let app = TestApp::new();

    let created = app.request("GET", "/api/session/lookup", None, IP_A).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["found"], false);
    assert_eq!(created.body["session"]["identity"], MAC_A);
    assert_eq!(created.body["session"]["status"], "awaiting_insertion");
    assert!(created.set_cookie.is_none(), "MAC-identified devices need no cookie");

    let resumed = app.request("POST", "/api/session/lookup", None, IP_A).await;
    assert_eq!(resumed.status, StatusCode::OK);
    assert_eq!(resumed.body["found"], true);
    assert_eq!(resumed.body["resumed"], true);
    assert_eq!(resumed.session_id(), created.session_id());
}

#[tokio::test]
async fn test_lookup_accepts_client_mac() {
    let app = TestApp::new();

    let response = app
        .request(
            "POST",
            "/api/session/lookup",
            Some(json!({ "mac": "cc:cc:cc:cc:cc:cc" })),
            IP_UNKNOWN,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["session"]["identity"], "cc:cc:cc:cc:cc:cc");

    let query = app
        .request(
            "GET",
            "/api/session/lookup?mac=cc:cc:cc:cc:cc:cc",
            None,
            IP_UNKNOWN,
        )
        .await;
    assert_eq!(query.status, StatusCode::OK);
    assert_eq!(query.session_id(), response.session_id());
}

#[tokio::test]
async fn test_unknown_device_is_identified_by_cookie() {
    let app = TestApp::new();

    let first = app.request("GET", "/api/session/lookup", None, IP_UNKNOWN).await;
    assert_eq!(first.status, StatusCode::CREATED);
    let token = first.device_cookie().expect("device cookie issued");
    assert_eq!(
        first.body["session"]["identity"],
        format!("device:{token}")
    );

    let second = app
        .request_with_cookie("GET", "/api/session/lookup", IP_UNKNOWN, &token)
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.session_id(), first.session_id());
    assert!(second.set_cookie.is_none());
}

#[tokio::test]
async fn test_lookup_follows_address_change() {
    let app = TestApp::new();

    let created = app
        .request(
            "POST",
            "/api/session/lookup",
            Some(json!({ "mac_address": MAC_A })),
            IP_A,
        )
        .await;
    let id = created.session_id();

    let moved = app
        .request(
            "POST",
            "/api/session/lookup",
            Some(json!({ "mac_address": MAC_A })),
            "192.168.4.77",
        )
        .await;
    assert_eq!(moved.session_id(), id);
    assert_eq!(moved.body["session"]["ip_address"], "192.168.4.77");
}

#[tokio::test]
async fn test_get_missing_session_is_not_found() {
    let app = TestApp::new();

    let response = app.request("GET", "/api/session/999", None, IP_A).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.error_code(), "not_found");
}

#[tokio::test]
async fn test_get_session_returns_full_record() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;

    let response = app
        .request("GET", &format!("/api/session/{id}"), None, IP_A)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["session"]["id"], id);
    assert_eq!(response.body["session"]["ip_address"], IP_A);
    assert_eq!(response.body["session"]["bottles_inserted"], 0);
}

#[tokio::test]
async fn test_activation_requires_bottles() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;

    let response = app
        .request("POST", &format!("/api/session/{id}/activate"), None, IP_A)
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "no_bottles");
    assert!(app.enforcer.grants().is_empty());
}

#[tokio::test]
async fn test_administrative_status_changes() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;
    let path = format!("/api/session/{id}/status");

    let invalid = app
        .request("POST", &path, Some(json!({ "status": "active" })), IP_A)
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.error_code(), "validation_error");

    let unknown = app
        .request("POST", &path, Some(json!({ "status": "paused" })), IP_A)
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    let missing = app.request("POST", &path, None, IP_A).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let released = app
        .request(
            "POST",
            &path,
            Some(json!({ "status": "awaiting_insertion" })),
            IP_A,
        )
        .await;
    assert_eq!(released.status, StatusCode::OK);
    assert_eq!(released.body["status"], "awaiting_insertion");

    let revoked = app
        .request("POST", &path, Some(json!({ "status": "revoked" })), IP_A)
        .await;
    assert_eq!(revoked.status, StatusCode::OK);
    assert_eq!(revoked.body["status"], "revoked");

    // Terminal sessions stay terminal.
    let reopened = app
        .request(
            "POST",
            &path,
            Some(json!({ "status": "awaiting_insertion" })),
            IP_A,
        )
        .await;
    assert_eq!(reopened.status, StatusCode::BAD_REQUEST);
    assert_eq!(reopened.error_code(), "invalid_transition");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;

    let response = app
        .request(
            "POST",
            &format!("/api/session/{id}/status"),
            Some(json!("not an object")),
            IP_A,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "validation_error");
}
