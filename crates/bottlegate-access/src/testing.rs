//! Test doubles shared by unit tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bottlegate_core::error::AppError;
use bottlegate_core::result::AppResult;
use bottlegate_core::traits::AccessEnforcer;

use crate::store::{MemorySessionStore, SessionStore};

/// Enforcer that remembers every call and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingEnforcer {
    grants: Mutex<Vec<(String, i64)>>,
    revokes: Mutex<Vec<String>>,
    failing: AtomicBool,
}

impl RecordingEnforcer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

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
        self.grants.lock().unwrap().push((ip.to_string(), duration_seconds));
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::upstream("firewall unavailable"));
        }
        Ok(())
    }

    async fn revoke(&self, ip: &str) -> AppResult<()> {
        self.revokes.lock().unwrap().push(ip.to_string());
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::upstream("firewall unavailable"));
        }
        Ok(())
    }
}

/// Create an active session worth `seconds` that started at `start`.
pub async fn active_session(
    store: &MemorySessionStore,
    identity: &str,
    ip: &str,
    start: DateTime<Utc>,
    seconds: i64,
) -> i64 {
    let id = store
        .acquire_insertion_lock(identity, ip, start)
        .await
        .unwrap()
        .unwrap();
    store.add_bottle(id, seconds, start).await.unwrap();
    store.start_session(id, start).await.unwrap();
    id
}
