//! Session store trait and backend dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bottlegate_core::config::{SessionBackend, SessionConfig};
use bottlegate_core::error::AppError;
use bottlegate_core::result::AppResult;
use bottlegate_database::DatabasePool;
use bottlegate_database::repositories::{RatingRepository, SessionRepository};
use bottlegate_entity::rating::{NewRating, Rating};
use bottlegate_entity::session::{Extension, Session, SessionStatus};

use super::memory::MemorySessionStore;
use super::postgres::PgSessionStore;

/// Reason code for a bottle event on a session that cannot take one.
pub const REASON_NOT_ACCEPTING: &str = "session_not_accepting";
/// Reason code for activating a session with no bottles.
pub const REASON_NO_BOTTLES: &str = "no_bottles";
/// Reason code for any other transition the current status forbids.
pub const REASON_INVALID_TRANSITION: &str = "invalid_transition";

/// Durable session state and the machine-wide insertion slot.
///
/// Implementations must make every method a single atomic step with respect
/// to concurrent callers, including callers in other processes sharing the
/// same backend. A guarded method whose guard fails returns
/// [`ErrorKind::NotFound`](bottlegate_core::error::ErrorKind::NotFound) for a
/// missing session and
/// [`ErrorKind::InvalidState`](bottlegate_core::error::ErrorKind::InvalidState)
/// otherwise.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Create a pre-active session and return its id.
    async fn create_session(
        &self,
        identity: &str,
        ip_address: &str,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<i64>;

    /// Fetch a session by id.
    async fn get_session(&self, id: i64) -> AppResult<Option<Session>>;

    /// The newest session of `identity` whose status is one of `statuses`.
    async fn get_session_for_device(
        &self,
        identity: &str,
        statuses: &[SessionStatus],
    ) -> AppResult<Option<Session>>;

    /// Claim the insertion slot for `identity`.
    ///
    /// Reuses the identity's newest `awaiting_insertion` session or creates
    /// a fresh one. Returns `None` when any session already holds the slot.
    async fn acquire_insertion_lock(
        &self,
        identity: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i64>>;

    /// Give the slot back. Returns `false` when `id` was not holding it.
    async fn release_insertion_lock(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool>;

    /// Move a pre-active session to another pre-active status.
    async fn update_status(
        &self,
        id: i64,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Session>;

    /// Credit one bottle to a pre-active session.
    async fn add_bottle(
        &self,
        id: i64,
        seconds_per_bottle: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Session>;

    /// Activate a pre-active session; the window is `start + seconds_earned`.
    async fn start_session(&self, id: i64, start: DateTime<Utc>) -> AppResult<Session>;

    /// Extend an active session by `extra_seconds`, counting one bottle.
    async fn extend_session(
        &self,
        id: i64,
        extra_seconds: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Extension>;

    /// Revoke a non-terminal session. `None` when missing or already terminal.
    async fn revoke_session(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<Session>>;

    /// Expire a non-terminal session. `None` when missing or already terminal.
    async fn expire_session(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<Session>>;

    /// Expire an active session only if its end is at or before `now`.
    async fn expire_if_due(&self, id: i64, now: DateTime<Utc>) -> AppResult<Option<Session>>;

    /// All active sessions, soonest end first.
    async fn list_active(&self) -> AppResult<Vec<Session>>;

    /// Release every claim that began before `cutoff`.
    async fn release_stale_insertions(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i64>>;

    /// Record the latest client address of a session.
    async fn update_ip(&self, id: i64, ip_address: &str, now: DateTime<Utc>) -> AppResult<()>;

    /// Store feedback for a session.
    async fn submit_rating(&self, rating: &NewRating, now: DateTime<Utc>) -> AppResult<Rating>;
}

/// Error for a guarded step that did not apply to an existing session.
pub(crate) fn guard_failed(session: Option<Session>, id: i64, code: &'static str) -> AppError {
    match session {
        None => AppError::not_found(format!("Session {id} not found")),
        Some(session) => AppError::invalid_state(
            code,
            format!("Session {id} is {}", session.status),
        ),
    }
}

/// Error for a failed activation, distinguishing the empty-session case.
pub(crate) fn start_failed(session: Option<Session>, id: i64) -> AppError {
    match session {
        Some(s) if s.status.is_pre_active() && s.bottles_inserted == 0 => AppError::invalid_state(
            REASON_NO_BOTTLES,
            format!("Session {id} has no bottles to redeem"),
        ),
        other => guard_failed(other, id, REASON_INVALID_TRANSITION),
    }
}

/// Error for activating a session while the same device already has access.
pub(crate) fn already_active(id: i64, active_id: i64) -> AppError {
    AppError::conflict(format!(
        "Session {id} cannot start: the device already has active session {active_id}"
    ))
}

/// Dispatcher for session store backends.
///
/// Switches between the shared Postgres store and the single-process
/// in-memory store based on configuration.
#[derive(Debug, Clone)]
pub enum SessionStoreDispatch {
    /// Postgres-backed store (multi-process safe).
    Postgres(PgSessionStore),
    /// In-memory store (single process, tests and demos).
    Memory(MemorySessionStore),
}

impl SessionStoreDispatch {
    /// Build the configured backend.
    ///
    /// The Postgres backend requires a connected pool.
    pub fn from_config(config: &SessionConfig, db: Option<&DatabasePool>) -> AppResult<Self> {
        match config.backend {
            SessionBackend::Memory => Ok(Self::Memory(MemorySessionStore::new())),
            SessionBackend::Postgres => {
                let db = db.ok_or_else(|| {
                    AppError::configuration("The postgres session backend needs a database pool")
                })?;
                let pool = db.pool().clone();
                Ok(Self::Postgres(PgSessionStore::new(
                    Arc::new(SessionRepository::new(pool.clone())),
                    Arc::new(RatingRepository::new(pool)),
                )))
            }
        }
    }
}

#[async_trait]
impl SessionStore for SessionStoreDispatch {
    async fn create_session(
        &self,
        identity: &str,
        ip_address: &str,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        match self {
            Self::Postgres(inner) => inner.create_session(identity, ip_address, status, now).await,
            Self::Memory(inner) => inner.create_session(identity, ip_address, status, now).await,
        }
    }

    async fn get_session(&self, id: i64) -> AppResult<Option<Session>> {
        match self {
            Self::Postgres(inner) => inner.get_session(id).await,
            Self::Memory(inner) => inner.get_session(id).await,
        }
    }

    async fn get_session_for_device(
        &self,
        identity: &str,
        statuses: &[SessionStatus],
    ) -> AppResult<Option<Session>> {
        match self {
            Self::Postgres(inner) => inner.get_session_for_device(identity, statuses).await,
            Self::Memory(inner) => inner.get_session_for_device(identity, statuses).await,
        }
    }

    async fn acquire_insertion_lock(
        &self,
        identity: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i64>> {
        match self {
            Self::Postgres(inner) => inner.acquire_insertion_lock(identity, ip_address, now).await,
            Self::Memory(inner) => inner.acquire_insertion_lock(identity, ip_address, now).await,
        }
    }

    async fn release_insertion_lock(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        match self {
            Self::Postgres(inner) => inner.release_insertion_lock(id, now).await,
            Self::Memory(inner) => inner.release_insertion_lock(id, now).await,
        }
    }

    async fn update_status(
        &self,
        id: i64,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        match self {
            Self::Postgres(inner) => inner.update_status(id, status, now).await,
            Self::Memory(inner) => inner.update_status(id, status, now).await,
        }
    }

    async fn add_bottle(
        &self,
        id: i64,
        seconds_per_bottle: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        match self {
            Self::Postgres(inner) => inner.add_bottle(id, seconds_per_bottle, now).await,
            Self::Memory(inner) => inner.add_bottle(id, seconds_per_bottle, now).await,
        }
    }

    async fn start_session(&self, id: i64, start: DateTime<Utc>) -> AppResult<Session> {
        match self {
            Self::Postgres(inner) => inner.start_session(id, start).await,
            Self::Memory(inner) => inner.start_session(id, start).await,
        }
    }

    async fn extend_session(
        &self,
        id: i64,
        extra_seconds: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Extension> {
        match self {
            Self::Postgres(inner) => inner.extend_session(id, extra_seconds, now).await,
            Self::Memory(inner) => inner.extend_session(id, extra_seconds, now).await,
        }
    }

    async fn revoke_session(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<Session>> {
        match self {
            Self::Postgres(inner) => inner.revoke_session(id, at).await,
            Self::Memory(inner) => inner.revoke_session(id, at).await,
        }
    }

    async fn expire_session(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<Session>> {
        match self {
            Self::Postgres(inner) => inner.expire_session(id, at).await,
            Self::Memory(inner) => inner.expire_session(id, at).await,
        }
    }

    async fn expire_if_due(&self, id: i64, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        match self {
            Self::Postgres(inner) => inner.expire_if_due(id, now).await,
            Self::Memory(inner) => inner.expire_if_due(id, now).await,
        }
    }

    async fn list_active(&self) -> AppResult<Vec<Session>> {
        match self {
            Self::Postgres(inner) => inner.list_active().await,
            Self::Memory(inner) => inner.list_active().await,
        }
    }

    async fn release_stale_insertions(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i64>> {
        match self {
            Self::Postgres(inner) => inner.release_stale_insertions(cutoff, now).await,
            Self::Memory(inner) => inner.release_stale_insertions(cutoff, now).await,
        }
    }

    async fn update_ip(&self, id: i64, ip_address: &str, now: DateTime<Utc>) -> AppResult<()> {
        match self {
            Self::Postgres(inner) => inner.update_ip(id, ip_address, now).await,
            Self::Memory(inner) => inner.update_ip(id, ip_address, now).await,
        }
    }

    async fn submit_rating(&self, rating: &NewRating, now: DateTime<Utc>) -> AppResult<Rating> {
        match self {
            Self::Postgres(inner) => inner.submit_rating(rating, now).await,
            Self::Memory(inner) => inner.submit_rating(rating, now).await,
        }
    }
}
