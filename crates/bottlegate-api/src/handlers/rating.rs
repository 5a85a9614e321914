//! Rating handler.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use validator::Validate;

use bottlegate_core::error::AppError;

use crate::dto::request::RatingRequest;
use crate::dto::response::{ApiResponse, RatingResponse};
use crate::error::ApiError;
use crate::extractors::OptionalJson;
use crate::state::AppState;

/// POST /api/rating/{id}
pub async fn submit_rating(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    OptionalJson(req): OptionalJson<RatingRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RatingResponse>>), ApiError> {
    req.validate()
        .map_err(|e| AppError::validation(format!("Validation failed: {e}")))?;

    let rating = state.controller.rate(&req.into_new_rating(id)).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(RatingResponse { rating })),
    ))
}
