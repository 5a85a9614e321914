//! Session handlers: slot claims, portal lookup, status and activation.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;
use validator::Validate;

use bottlegate_access::Claim;
use bottlegate_core::error::AppError;
use bottlegate_entity::session::{Session, SessionStatus};

use crate::dto::request::{DeviceQuery, DeviceRequest, StatusUpdateRequest};
use crate::dto::response::{
    ApiResponse, ClaimResponse, LookupResponse, SessionResponse, SessionStatusResponse,
    UnlockResponse,
};
use crate::error::ApiError;
use crate::extractors::{ClientIp, OptionalJson, remember_device, resolve_device};
use crate::state::AppState;

type LookupReply = (StatusCode, CookieJar, Json<ApiResponse<LookupResponse>>);

/// POST /api/session/create
///
/// 201 with the claimed session, or 200 with the device's active session.
pub async fn create_session(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    OptionalJson(req): OptionalJson<DeviceRequest>,
) -> Result<(StatusCode, CookieJar, Json<ApiResponse<ClaimResponse>>), ApiError> {
    let device = resolve_device(&state, &ip, req.explicit_mac(), &jar).await;
    let jar = remember_device(jar, &device, state.config.session.cookie_max_age_days);

    match state.controller.claim(&device.identity(), &ip).await? {
        Claim::Acquired(session_id) => Ok((
            StatusCode::CREATED,
            jar,
            Json(ApiResponse::ok(ClaimResponse {
                session_id,
                status: SessionStatus::Inserting,
            })),
        )),
        Claim::Active(session_id) => Ok((
            StatusCode::OK,
            jar,
            Json(ApiResponse::ok(ClaimResponse {
                session_id,
                status: SessionStatus::Active,
            })),
        )),
        Claim::Busy => Err(AppError::busy(
            "The machine is in use by another device, please wait",
        )
        .into()),
    }
}

/// POST /api/session/unlock
pub async fn unlock_session(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    OptionalJson(req): OptionalJson<DeviceRequest>,
) -> Result<Json<ApiResponse<UnlockResponse>>, ApiError> {
    let device = resolve_device(&state, &ip, req.explicit_mac(), &jar).await;
    let released = state.controller.release(&device.identity()).await?;

    Ok(Json(ApiResponse::ok(UnlockResponse {
        released: released.is_some(),
        session_id: released,
    })))
}

/// GET /api/session/lookup
pub async fn lookup_session(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Query(query): Query<DeviceQuery>,
) -> Result<LookupReply, ApiError> {
    lookup(&state, &ip, query.mac, jar).await
}

/// POST /api/session/lookup
pub async fn lookup_session_post(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    OptionalJson(req): OptionalJson<DeviceRequest>,
) -> Result<LookupReply, ApiError> {
    lookup(&state, &ip, req.explicit_mac(), jar).await
}

async fn lookup(
    state: &AppState,
    ip: &str,
    mac: Option<String>,
    jar: CookieJar,
) -> Result<LookupReply, ApiError> {
    let device = resolve_device(state, ip, mac, &jar).await;
    let jar = remember_device(jar, &device, state.config.session.cookie_max_age_days);

    let outcome = state.controller.lookup(&device.identity(), ip).await?;
    let status = if outcome.found {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };

    Ok((status, jar, Json(ApiResponse::ok(outcome.into()))))
}

/// GET /api/session/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state.controller.status(id).await?;
    Ok(Json(ApiResponse::ok(SessionResponse { session })))
}

/// GET /api/session/{id}/status
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SessionStatusResponse>>, ApiError> {
    let session = state.controller.status(id).await?;
    Ok(Json(ApiResponse::ok(summary(&state, &session))))
}

/// POST /api/session/{id}/status
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    OptionalJson(req): OptionalJson<StatusUpdateRequest>,
) -> Result<Json<ApiResponse<SessionStatusResponse>>, ApiError> {
    req.validate()
        .map_err(|e| AppError::validation(format!("Validation failed: {e}")))?;
    let status: SessionStatus = req.status.parse().map_err(AppError::validation)?;

    let session = state.controller.set_status(id, status).await?;
    Ok(Json(ApiResponse::ok(summary(&state, &session))))
}

/// POST /api/session/{id}/activate
pub async fn activate_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SessionStatusResponse>>, ApiError> {
    let session = state.controller.activate(id).await?;
    Ok(Json(ApiResponse::ok(summary(&state, &session))))
}

/// POST /api/session/{id}/expire
pub async fn expire_session(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SessionStatusResponse>>, ApiError> {
    let session = state.controller.expire(id).await?;
    Ok(Json(ApiResponse::ok(summary(&state, &session))))
}

fn summary(state: &AppState, session: &Session) -> SessionStatusResponse {
    SessionStatusResponse::new(session, state.controller.remaining_seconds(session))
}
