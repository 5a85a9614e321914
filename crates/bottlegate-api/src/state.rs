//! Shared application state passed to all handlers.

use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;

use bottlegate_access::{IdentityResolver, SessionController};
use bottlegate_core::config::AppConfig;

/// Application state shared across all Axum handlers via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Session lifecycle controller.
    pub controller: Arc<SessionController>,
    /// Device identity resolver.
    pub identity: Arc<IdentityResolver>,
    /// Database pool, absent with the in-memory backend.
    pub db: Option<PgPool>,
    /// When the server started.
    pub started_at: Instant,
}

impl AppState {
    /// Creates the handler state.
    pub fn new(
        config: Arc<AppConfig>,
        controller: Arc<SessionController>,
        identity: Arc<IdentityResolver>,
        db: Option<PgPool>,
    ) -> Self {
        Self {
            config,
            controller,
            identity,
            db,
            started_at: Instant::now(),
        }
    }
}
