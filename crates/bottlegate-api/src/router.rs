//! Route definitions for the BottleGate HTTP API.
//!
//! Portal and machine routes live under `/api`; the sensor and the captive
//! portal probes are mounted at the root where devices expect them.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    let api_routes = Router::new()
        .merge(session_routes())
        .merge(bottle_routes())
        .merge(rating_routes())
        .merge(dev_routes())
        .merge(health_routes());

    Router::new()
        .nest("/api", api_routes)
        .merge(sensor_routes())
        .merge(captive_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum_middleware::from_fn(
            middleware::logging::request_logging,
        ))
        .with_state(state)
}

/// Session endpoints: claim, release, lookup, status, activation
fn session_routes() -> Router<AppState> {
    use handlers::session;

    Router::new()
        .route("/session/create", post(session::create_session))
        .route("/session/unlock", post(session::unlock_session))
        .route(
            "/session/lookup",
            get(session::lookup_session).post(session::lookup_session_post),
        )
        .route("/session/{id}", get(session::get_session))
        .route(
            "/session/{id}/status",
            get(session::get_status).post(session::set_status),
        )
        .route("/session/{id}/activate", post(session::activate_session))
        .route("/session/{id}/expire", post(session::expire_session))
}

/// Bottle events from the portal page
fn bottle_routes() -> Router<AppState> {
    Router::new().route("/bottle", post(handlers::bottle::bottle_event))
}

/// Post-session feedback
fn rating_routes() -> Router<AppState> {
    Router::new().route("/rating/{id}", post(handlers::rating::submit_rating))
}

/// Developer helpers (mock sensor mode only)
fn dev_routes() -> Router<AppState> {
    Router::new().route("/dev/clear-device", post(handlers::dev::clear_device))
}

/// Health
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}

/// Bottle sensor hardware
fn sensor_routes() -> Router<AppState> {
    Router::new().route("/sensor/hit", post(handlers::bottle::sensor_hit))
}

/// Captive portal detection probes (Android, Windows, Apple)
fn captive_routes() -> Router<AppState> {
    use handlers::captive::captive_probe;

    Router::new()
        .route("/generate_204", get(captive_probe))
        .route("/connecttest.txt", get(captive_probe))
        .route("/hotspot-detect.html", get(captive_probe))
}
