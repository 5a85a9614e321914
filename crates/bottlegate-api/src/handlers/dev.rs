//! Developer-only endpoints, enabled together with the mock sensor.

use axum::Json;
use axum::extract::State;
use axum_extra::extract::cookie::{Cookie, CookieJar};

use bottlegate_access::identity::DEVICE_COOKIE;
use bottlegate_core::error::AppError;

use crate::dto::response::{ApiResponse, MessageResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/dev/clear-device
pub async fn clear_device(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<MessageResponse>>), ApiError> {
    if !state.config.mock_sensor {
        return Err(AppError::forbidden("Developer endpoints are disabled").into());
    }

    let jar = jar.remove(Cookie::build((DEVICE_COOKIE, "")).path("/"));
    Ok((
        jar,
        Json(ApiResponse::ok(MessageResponse {
            message: "Device cookie cleared".to_string(),
        })),
    ))
}
