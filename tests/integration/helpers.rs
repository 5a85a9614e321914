//! Shared test helpers for integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use bottlegate_access::{IdentityResolver, MemorySessionStore, SessionController, TokioClock};
use bottlegate_api::{AppState, build_app};
use bottlegate_core::config::{AppConfig, SessionBackend};
use bottlegate_core::result::AppResult;
use bottlegate_core::traits::{AccessEnforcer, MacResolver};

/// Address of device A, known to the MAC table.
pub const IP_A: &str = "192.168.4.10";
pub const MAC_A: &str = "aa:aa:aa:aa:aa:aa";
/// Address of device B, known to the MAC table.
pub const IP_B: &str = "192.168.4.11";
pub const MAC_B: &str = "bb:bb:bb:bb:bb:bb";
/// Address with no MAC entry; identified by cookie.
pub const IP_UNKNOWN: &str = "192.168.4.50";

/// MAC lookup backed by a fixed table.
#[derive(Debug, Default)]
pub struct StaticMacResolver {
    table: HashMap<String, String>,
}

#[async_trait]
impl MacResolver for StaticMacResolver {
    async fn resolve(&self, ip: &str) -> Option<String> {
        self.table.get(ip).cloned()
    }
}

/// Enforcer that records every grant and revoke.
#[derive(Debug, Default)]
pub struct RecordingEnforcer {
    grants: Mutex<Vec<(String, i64)>>,
    revokes: Mutex<Vec<String>>,
}

impl RecordingEnforcer {
    pub fn grants(&self) -> Vec<(String, i64)> {
        self.grants.lock().unwrap().clone()
    }

    pub fn revokes(&self) -> Vec<String> {
        self.revokes.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccessEnforcer for RecordingEnforcer {
    async fn grant(&self, ip: &str, duration_seconds: i64) -> AppResult<()> {
        self.grants
            .lock()
            .unwrap()
            .push((ip.to_string(), duration_seconds));
        Ok(())
    }

    async fn revoke(&self, ip: &str) -> AppResult<()> {
        self.revokes.lock().unwrap().push(ip.to_string());
        Ok(())
    }
}

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Backing session store
    pub store: Arc<MemorySessionStore>,
    /// Recorded access grants
    pub enforcer: Arc<RecordingEnforcer>,
    /// The controller behind the router
    pub controller: Arc<SessionController>,
}

impl TestApp {
    /// Create a test application in mock sensor mode
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test application with a customized configuration
    pub fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let mut config = AppConfig::default();
        config.session.backend = SessionBackend::Memory;
        config.mock_sensor = true;
        customize(&mut config);

        let store = Arc::new(MemorySessionStore::new());
        let enforcer = Arc::new(RecordingEnforcer::default());
        let controller = Arc::new(SessionController::new(
            store.clone(),
            enforcer.clone(),
            Arc::new(TokioClock::new()),
            config.session.clone(),
        ));

        let macs = StaticMacResolver {
            table: HashMap::from([
                (IP_A.to_string(), MAC_A.to_string()),
                (IP_B.to_string(), MAC_B.to_string()),
            ]),
        };
        let identity = Arc::new(IdentityResolver::new(Arc::new(macs)));

        let state = AppState::new(Arc::new(config), controller.clone(), identity, None);

        Self {
            router: build_app(state),
            store,
            enforcer,
            controller,
        }
    }

    /// Make an HTTP request from `ip`
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        ip: &str,
    ) -> TestResponse {
        self.send(method, path, body, ip, None).await
    }

    /// Make an HTTP request from `ip` carrying a `device_id` cookie
    pub async fn request_with_cookie(
        &self,
        method: &str,
        path: &str,
        ip: &str,
        device_id: &str,
    ) -> TestResponse {
        self.send(method, path, None, ip, Some(device_id)).await
    }

    async fn send(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        ip: &str,
        device_id: Option<&str>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("x-real-ip", ip)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = device_id {
            req = req.header(header::COOKIE, format!("device_id={token}"));
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        TestResponse {
            status,
            body: serde_json::from_slice(&body_bytes).unwrap_or(Value::Null),
            text: String::from_utf8_lossy(&body_bytes).into_owned(),
            set_cookie,
            content_type,
        }
    }

    /// Claim the insertion slot from `ip` and return the session id
    pub async fn claim(&self, ip: &str) -> i64 {
        let response = self.request("POST", "/api/session/create", None, ip).await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "Claim failed: {:?}",
            response.body
        );
        response.session_id()
    }

    /// Send a bottle event for session `id`
    pub async fn bottle(&self, id: i64) -> TestResponse {
        self.request(
            "POST",
            "/api/bottle",
            Some(serde_json::json!({ "session_id": id })),
            IP_A,
        )
        .await
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body (`Null` for non-JSON bodies)
    pub body: Value,
    /// Raw body
    pub text: String,
    /// `Set-Cookie` header, if any
    pub set_cookie: Option<String>,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
}

impl TestResponse {
    /// `session_id` at the top level or inside `session`.
    pub fn session_id(&self) -> i64 {
        self.body
            .get("session_id")
            .or_else(|| self.body.get("session").and_then(|s| s.get("id")))
            .and_then(Value::as_i64)
            .expect("No session id in response")
    }

    /// The machine-readable error code.
    pub fn error_code(&self) -> &str {
        self.body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Value of the `device_id` cookie being set.
    pub fn device_cookie(&self) -> Option<String> {
        let cookie = self.set_cookie.as_deref()?;
        let value = cookie.strip_prefix("device_id=")?;
        Some(value.split(';').next().unwrap_or_default().to_string())
    }
}
