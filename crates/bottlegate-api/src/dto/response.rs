//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bottlegate_access::LookupOutcome;
use bottlegate_entity::rating::Rating;
use bottlegate_entity::session::{Session, SessionStatus};

/// Standard success response wrapper.
///
/// The payload is flattened next to `success`, so handlers return
/// `{"success": true, "session_id": 3, ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Result of claiming the insertion slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResponse {
    /// Session holding the slot, or the device's active session.
    pub session_id: i64,
    /// `inserting`, or `active` when the device already has access.
    pub status: SessionStatus,
}

/// Result of releasing the insertion slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockResponse {
    /// Whether this device held the slot.
    pub released: bool,
    /// The released session.
    pub session_id: Option<i64>,
}

/// Full session wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    /// The session.
    pub session: Session,
}

/// Portal lookup result.
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    /// An existing session was found.
    pub found: bool,
    /// The found session was resumed.
    pub resumed: bool,
    /// The resumed or new session.
    pub session: Session,
}

impl From<LookupOutcome> for LookupResponse {
    fn from(outcome: LookupOutcome) -> Self {
        Self {
            found: outcome.found,
            resumed: outcome.resumed,
            session: outcome.session,
        }
    }
}

/// Session status summary polled by the portal page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub session_id: i64,
    pub status: SessionStatus,
    pub bottles_inserted: i32,
    pub seconds_earned: i64,
    pub session_start: Option<DateTime<Utc>>,
    pub session_end: Option<DateTime<Utc>>,
    /// Seconds of access left; zero unless active.
    pub remaining_seconds: i64,
}

impl SessionStatusResponse {
    /// Summarize `session` with `remaining_seconds` of access left.
    pub fn new(session: &Session, remaining_seconds: i64) -> Self {
        Self {
            session_id: session.id,
            status: session.status,
            bottles_inserted: session.bottles_inserted,
            seconds_earned: session.seconds_earned,
            session_start: session.session_start,
            session_end: session.session_end,
            remaining_seconds,
        }
    }
}

/// Result of a bottle or sensor event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleResponse {
    pub session_id: i64,
    pub status: SessionStatus,
    pub bottles_inserted: i32,
    pub seconds_earned: i64,
    /// Earned time in whole minutes.
    pub minutes_earned: i64,
    /// New end of access for an active session.
    pub session_end: Option<DateTime<Utc>>,
}

impl From<Session> for BottleResponse {
    fn from(session: Session) -> Self {
        Self {
            session_id: session.id,
            status: session.status,
            bottles_inserted: session.bottles_inserted,
            seconds_earned: session.seconds_earned,
            minutes_earned: session.seconds_earned / 60,
            session_end: session.session_end,
        }
    }
}

/// Stored rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingResponse {
    /// The rating.
    pub rating: Rating,
}

/// Simple message response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Message.
    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Version.
    pub version: String,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// `connected`, `unavailable` or `not_configured`.
    pub database: String,
    /// Mock sensor mode.
    pub mock_sensor: bool,
    /// Active sessions with a pending expiry timer.
    pub pending_timers: usize,
}
