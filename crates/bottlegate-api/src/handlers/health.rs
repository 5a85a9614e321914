//! Health check handler.

use axum::Json;
use axum::extract::State;

use bottlegate_database::connection::ping;

use crate::dto::response::{ApiResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let database = match &state.db {
        Some(pool) => match ping(pool).await {
            Ok(true) => "connected",
            Ok(false) | Err(_) => "unavailable",
        },
        None => "not_configured",
    };

    let status = if database == "unavailable" {
        "degraded"
    } else {
        "ok"
    };

    Json(ApiResponse::ok(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        database: database.to_string(),
        mock_sensor: state.config.mock_sensor,
        pending_timers: state.controller.scheduler().pending(),
    }))
}
