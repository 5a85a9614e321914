//! Integration tests for the captive portal probes.

use axum::http::StatusCode;

use crate::helpers::{IP_A, IP_UNKNOWN, TestApp};

#[tokio::test]
async fn test_probe_redirects_to_portal_session() {
    let app = TestApp::new();

    let probe = app.request("GET", "/generate_204", None, IP_A).await;
    assert_eq!(probe.status, StatusCode::OK);
    assert!(
        probe
            .content_type
            .as_deref()
            .is_some_and(|c| c.starts_with("text/html")),
        "unexpected content type {:?}",
        probe.content_type
    );
    assert!(probe.text.contains("/?session=1"), "{}", probe.text);

    // Every platform's probe lands on the same session.
    for path in ["/connecttest.txt", "/hotspot-detect.html"] {
        let response = app.request("GET", path, None, IP_A).await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.text.contains("/?session=1"), "{path}: {}", response.text);
    }

    let lookup = app.request("GET", "/api/session/lookup", None, IP_A).await;
    assert_eq!(lookup.status, StatusCode::OK);
    assert_eq!(lookup.session_id(), 1);
}

#[tokio::test]
async fn test_probe_reuses_claimed_session() {
    let app = TestApp::new();
    let id = app.claim(IP_A).await;

    let probe = app.request("GET", "/generate_204", None, IP_A).await;
    assert!(probe.text.contains(&format!("/?session={id}")));
}

#[tokio::test]
async fn test_probe_issues_device_cookie() {
    let app = TestApp::new();

    let probe = app.request("GET", "/hotspot-detect.html", None, IP_UNKNOWN).await;
    assert_eq!(probe.status, StatusCode::OK);
    let token = probe.device_cookie().expect("device cookie issued");

    let lookup = app
        .request_with_cookie("GET", "/api/session/lookup", IP_UNKNOWN, &token)
        .await;
    assert_eq!(lookup.status, StatusCode::OK);
    assert_eq!(lookup.body["session"]["identity"], format!("device:{token}"));
}
