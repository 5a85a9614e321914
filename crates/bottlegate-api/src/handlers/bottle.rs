//! Bottle and sensor event handlers.

use axum::Json;
use axum::extract::State;

use bottlegate_core::error::AppError;

use crate::dto::request::BottleRequest;
use crate::dto::response::{ApiResponse, BottleResponse};
use crate::error::ApiError;
use crate::extractors::OptionalJson;
use crate::state::AppState;

/// POST /api/bottle
pub async fn bottle_event(
    State(state): State<AppState>,
    OptionalJson(req): OptionalJson<BottleRequest>,
) -> Result<Json<ApiResponse<BottleResponse>>, ApiError> {
    credit(&state, req, "portal").await
}

/// POST /sensor/hit
pub async fn sensor_hit(
    State(state): State<AppState>,
    OptionalJson(req): OptionalJson<BottleRequest>,
) -> Result<Json<ApiResponse<BottleResponse>>, ApiError> {
    credit(&state, req, "sensor").await
}

async fn credit(
    state: &AppState,
    req: BottleRequest,
    source: &'static str,
) -> Result<Json<ApiResponse<BottleResponse>>, ApiError> {
    let id = req
        .session_id
        .ok_or_else(|| AppError::validation("session_id is required"))?;

    tracing::debug!(session_id = id, source = source, "Bottle event received");
    let session = state.controller.handle_bottle_event(id).await?;

    Ok(Json(ApiResponse::ok(session.into())))
}
