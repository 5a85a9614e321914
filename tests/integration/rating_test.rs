//! Integration tests for rating submission.

use axum::http::StatusCode;
use serde_json::json;

use crate::helpers::{IP_A, TestApp};

#[tokio::test]
async fn test_rating_is_stored() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;

    let response = app
        .request(
            "POST",
            &format!("/api/rating/{id}"),
            Some(json!({ "rating": 5, "q1": 4, "q3": 2, "comment": " quick and easy " })),
            IP_A,
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["rating"]["session_id"], id);
    assert_eq!(response.body["rating"]["rating"], 5);
    assert_eq!(response.body["rating"]["answers"]["q1"], 4);
    assert!(response.body["rating"]["answers"]["q2"].is_null());
    assert_eq!(response.body["rating"]["comment"], "quick and easy");
    assert_eq!(app.store.rating_count().await, 1);

    let session = app
        .request("GET", &format!("/api/session/{id}"), None, IP_A)
        .await;
    assert_eq!(session.body["session"]["rating"], 5);
}

#[tokio::test]
async fn test_session_rating_is_set_once() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;
    let path = format!("/api/rating/{id}");

    app.request("POST", &path, Some(json!({ "rating": 4 })), IP_A)
        .await;
    let second = app
        .request("POST", &path, Some(json!({ "rating": 1 })), IP_A)
        .await;
    assert_eq!(second.status, StatusCode::CREATED);

    let session = app
        .request("GET", &format!("/api/session/{id}"), None, IP_A)
        .await;
    assert_eq!(session.body["session"]["rating"], 4);
    assert_eq!(app.store.rating_count().await, 2);
}

#[tokio::test]
async fn test_out_of_range_rating_is_rejected() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;

    let response = app
        .request(
            "POST",
            &format!("/api/rating/{id}"),
            Some(json!({ "rating": 9 })),
            IP_A,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error_code(), "validation_error");
}

#[tokio::test]
async fn test_rating_unknown_session_is_not_found() {
    let app = TestApp::new();

    let response = app
        .request("POST", "/api/rating/77", Some(json!({ "rating": 3 })), IP_A)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
