//! Session repository implementation.
//!
//! Every state transition is a single conditional `UPDATE`/`INSERT` so that
//! several server processes can share one database without any in-process
//! locking. A statement that matches no row returns `None`; callers decide
//! whether that means "missing" or "not allowed in the current status".

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use bottlegate_core::error::{AppError, ErrorKind};
use bottlegate_core::result::AppResult;
use bottlegate_entity::session::{Extension, Session, SessionStatus};

use super::is_unique_violation;

/// Claims the insertion slot in one statement.
///
/// `holder` sees any current `inserting` row; if there is one nothing is
/// written. Otherwise the newest `awaiting_insertion` session of the
/// identity is promoted, or a fresh `inserting` row is created. Two callers
/// racing past the `holder` check collide on `uq_sessions_single_inserting`
/// and the loser gets a unique violation.
const CLAIM_INSERTION_SQL: &str = r#"
WITH holder AS (
    SELECT id FROM sessions WHERE status = 'inserting'
),
candidate AS (
    SELECT id FROM sessions
    WHERE identity = $1
      AND status = 'awaiting_insertion'
      AND NOT EXISTS (SELECT 1 FROM holder)
    ORDER BY created_at DESC, id DESC
    LIMIT 1
    FOR UPDATE
),
reused AS (
    UPDATE sessions
    SET status = 'inserting', ip_address = $2, inserting_since = $3, updated_at = $3
    WHERE id IN (SELECT id FROM candidate) AND status = 'awaiting_insertion'
    RETURNING id
),
created AS (
    INSERT INTO sessions (identity, ip_address, status, inserting_since, created_at, updated_at)
    SELECT $1, $2, 'inserting', $3, $3, $3
    WHERE NOT EXISTS (SELECT 1 FROM holder)
      AND NOT EXISTS (SELECT 1 FROM candidate)
    RETURNING id
)
SELECT id FROM reused
UNION ALL
SELECT id FROM created
"#;

/// Repository for session persistence and atomic transitions.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new session and return its id.
    ///
    /// Creating a session directly in `inserting` competes for the slot like
    /// a claim does and fails with [`ErrorKind::Busy`] when it is taken.
    pub async fn create(
        &self,
        identity: &str,
        ip_address: &str,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        if !status.is_pre_active() {
            return Err(AppError::validation(format!(
                "Sessions cannot be created as '{status}'"
            )));
        }

        let inserting_since = (status == SessionStatus::Inserting).then_some(now);

        sqlx::query_scalar::<_, i64>(
            "INSERT INTO sessions (identity, ip_address, status, inserting_since, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) RETURNING id",
        )
        .bind(identity)
        .bind(ip_address)
        .bind(status)
        .bind(inserting_since)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::busy("Another device is currently inserting a bottle")
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to create session", e)
            }
        })
    }

    /// Find a session by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find session", e))
    }

    /// Find the most recent session of `identity` whose status is in `statuses`.
    pub async fn find_latest_for_identity(
        &self,
        identity: &str,
        statuses: &[SessionStatus],
    ) -> AppResult<Option<Session>> {
        let statuses: Vec<&str> = statuses.iter().map(SessionStatus::as_str).collect();

        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE identity = $1 AND status::text = ANY($2) \
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(identity)
        .bind(&statuses)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find session for device", e)
        })
    }

    /// Atomically claim the machine-wide insertion slot.
    ///
    /// Returns `None` when another session already holds it.
    pub async fn claim_insertion(
        &self,
        identity: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i64>> {
        let result = sqlx::query_scalar::<_, i64>(CLAIM_INSERTION_SQL)
            .bind(identity)
            .bind(ip_address)
            .bind(now)
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(id) => Ok(id),
            Err(e) if is_unique_violation(&e) => {
                debug!(identity = %identity, "Lost insertion slot race");
                Ok(None)
            }
            Err(e) => Err(AppError::with_source(
                ErrorKind::Database,
                "Failed to claim insertion slot",
                e,
            )),
        }
    }

    /// Move an `inserting` session back to `awaiting_insertion`.
    pub async fn release_insertion(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE sessions SET status = 'awaiting_insertion', inserting_since = NULL, updated_at = $2 \
             WHERE id = $1 AND status = 'inserting'",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to release insertion slot", e)
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Release every claim older than `cutoff`, returning the affected ids.
    pub async fn release_stale_insertions(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE sessions SET status = 'awaiting_insertion', inserting_since = NULL, updated_at = $2 \
             WHERE status = 'inserting' AND inserting_since < $1 RETURNING id",
        )
        .bind(cutoff)
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to release stale insertions", e)
        })
    }

    /// Switch a pre-active session between `awaiting_insertion` and `inserting`.
    pub async fn set_pre_active_status(
        &self,
        id: i64,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        if !status.is_pre_active() {
            return Err(AppError::validation(format!(
                "'{status}' is not a pre-active status"
            )));
        }

        let inserting_since = (status == SessionStatus::Inserting).then_some(now);

        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET status = $2, inserting_since = $3, updated_at = $4 \
             WHERE id = $1 AND status IN ('awaiting_insertion', 'inserting') RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(inserting_since)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::busy("Another device is currently inserting a bottle")
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to update session status", e)
            }
        })
    }

    /// Credit one bottle to a pre-active session.
    ///
    /// A bottle from the slot holder restarts its insertion timeout.
    pub async fn add_bottle(
        &self,
        id: i64,
        seconds_per_bottle: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET bottles_inserted = bottles_inserted + 1, \
             seconds_earned = seconds_earned + $2, \
             inserting_since = CASE WHEN status = 'inserting' THEN $3 ELSE inserting_since END, \
             updated_at = $3 \
             WHERE id = $1 AND status IN ('awaiting_insertion', 'inserting') RETURNING *",
        )
        .bind(id)
        .bind(seconds_per_bottle)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to add bottle", e))
    }

    /// Activate a pre-active session that has at least one bottle.
    ///
    /// The access window is computed from the stored `seconds_earned` so a
    /// concurrent bottle event cannot be lost between read and write. A
    /// second active session for the same identity trips
    /// `uq_sessions_active_identity` and fails with [`ErrorKind::Conflict`].
    pub async fn start(&self, id: i64, start: DateTime<Utc>) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET status = 'active', session_start = $2, \
             session_end = $2 + seconds_earned::double precision * INTERVAL '1 second', \
             inserting_since = NULL, updated_at = $2 \
             WHERE id = $1 AND status IN ('awaiting_insertion', 'inserting') \
             AND bottles_inserted > 0 RETURNING *",
        )
        .bind(id)
        .bind(start)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::conflict(format!(
                    "Session {id} cannot start: the device already has an active session"
                ))
            } else {
                AppError::with_source(ErrorKind::Database, "Failed to start session", e)
            }
        })
    }

    /// Push the end of an active session out by `extra_seconds`.
    pub async fn extend(
        &self,
        id: i64,
        extra_seconds: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Extension>> {
        let row: Option<(DateTime<Utc>, i32)> = sqlx::query_as(
            "UPDATE sessions SET \
             session_end = session_end + $2::double precision * INTERVAL '1 second', \
             bottles_inserted = bottles_inserted + 1, \
             seconds_earned = seconds_earned + $2, updated_at = $3 \
             WHERE id = $1 AND status = 'active' RETURNING session_end, bottles_inserted",
        )
        .bind(id)
        .bind(extra_seconds)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to extend session", e))?;

        Ok(row.map(|(new_end, bottles_inserted)| Extension {
            new_end,
            bottles_inserted,
        }))
    }

    /// Move a non-terminal session into a terminal status.
    ///
    /// Returns `None` when the session is missing or already terminal.
    pub async fn finish(
        &self,
        id: i64,
        status: SessionStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Session>> {
        if !status.is_terminal() {
            return Err(AppError::validation(format!(
                "'{status}' is not a terminal status"
            )));
        }

        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET status = $2, session_end = NULL, inserting_since = NULL, \
             ended_at = $3, updated_at = $3 \
             WHERE id = $1 AND status NOT IN ('expired', 'revoked') RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to end session", e))
    }

    /// Expire an active session only if its end has passed at `now`.
    pub async fn expire_if_due(&self, id: i64, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET status = 'expired', session_end = NULL, ended_at = $2, updated_at = $2 \
             WHERE id = $1 AND status = 'active' AND session_end <= $2 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to expire session", e))
    }

    /// Record the latest client address of a live session.
    ///
    /// Terminal sessions are left untouched.
    pub async fn update_ip(&self, id: i64, ip_address: &str, now: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "UPDATE sessions SET ip_address = $2, updated_at = $3 \
             WHERE id = $1 AND status NOT IN ('expired', 'revoked')",
        )
        .bind(id)
        .bind(ip_address)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update session address", e)
        })?;
        Ok(())
    }

    /// List all active sessions, soonest end first.
    pub async fn find_active(&self) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE status = 'active' ORDER BY session_end ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list active sessions", e)
        })
    }

    /// List recent sessions, optionally filtered by status.
    pub async fn list_recent(
        &self,
        status: Option<SessionStatus>,
        limit: i64,
    ) -> AppResult<Vec<Session>> {
        sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE ($1::session_status IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list sessions", e))
    }

    /// Count sessions per status.
    pub async fn count_by_status(&self) -> AppResult<Vec<(SessionStatus, i64)>> {
        sqlx::query_as::<_, (SessionStatus, i64)>(
            "SELECT status, COUNT(*) FROM sessions GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count sessions", e))
    }

    /// Delete terminal sessions that ended before `before` (all when `None`).
    ///
    /// Ratings of deleted sessions are removed by cascade.
    pub async fn purge_terminal(&self, before: Option<DateTime<Utc>>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM sessions WHERE status IN ('expired', 'revoked') \
             AND ($1::timestamptz IS NULL OR ended_at < $1)",
        )
        .bind(before)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to purge sessions", e))?;

        Ok(result.rows_affected())
    }
}
