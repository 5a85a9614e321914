//! In-memory session store using a Tokio mutex for single-process deployments.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use bottlegate_core::error::AppError;
use bottlegate_core::result::AppResult;
use bottlegate_entity::rating::{NewRating, Rating};
use bottlegate_entity::session::{Extension, Session, SessionStatus};

use super::backend::{
    REASON_INVALID_TRANSITION, REASON_NOT_ACCEPTING, SessionStore, already_active, guard_failed,
    start_failed,
};

/// Internal state for the memory-based store.
#[derive(Debug, Default)]
struct InnerState {
    /// Last assigned session id.
    last_session_id: i64,
    /// Last assigned rating id.
    last_rating_id: i64,
    /// Sessions keyed by id; iteration order is creation order.
    sessions: BTreeMap<i64, Session>,
    /// Submitted ratings.
    ratings: Vec<Rating>,
}

impl InnerState {
    fn insert(
        &mut self,
        identity: &str,
        ip_address: &str,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> i64 {
        self.last_session_id += 1;
        let id = self.last_session_id;
        self.sessions.insert(
            id,
            Session {
                id,
                identity: identity.to_string(),
                ip_address: ip_address.to_string(),
                status,
                bottles_inserted: 0,
                seconds_earned: 0,
                inserting_since: (status == SessionStatus::Inserting).then_some(now),
                session_start: None,
                session_end: None,
                ended_at: None,
                rating: None,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }

    fn slot_holder(&self) -> Option<i64> {
        self.sessions
            .values()
            .find(|s| s.status == SessionStatus::Inserting)
            .map(|s| s.id)
    }

    fn active_for_identity(&self, identity: &str) -> Option<i64> {
        self.sessions
            .values()
            .find(|s| s.identity == identity && s.status == SessionStatus::Active)
            .map(|s| s.id)
    }

    fn finish(&mut self, id: i64, status: SessionStatus, at: DateTime<Utc>) -> Option<Session> {
        let session = self.sessions.get_mut(&id)?;
        if session.is_terminal() {
            return None;
        }
        session.status = status;
        session.session_end = None;
        session.inserting_since = None;
        session.ended_at = Some(at);
        session.updated_at = at;
        Some(session.clone())
    }
}

/// In-memory session store.
///
/// Every operation runs under one mutex, which gives the same atomicity as
/// the single-statement Postgres transitions within one process.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    /// Protected inner state.
    state: Arc<Mutex<InnerState>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored ratings.
    pub async fn rating_count(&self) -> usize {
        self.state.lock().await.ratings.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(
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

        let mut state = self.state.lock().await;
        if status == SessionStatus::Inserting && state.slot_holder().is_some() {
            return Err(AppError::busy("Another device is currently inserting a bottle"));
        }
        Ok(state.insert(identity, ip_address, status, now))
    }

    async fn get_session(&self, id: i64) -> AppResult<Option<Session>> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn get_session_for_device(
        &self,
        identity: &str,
        statuses: &[SessionStatus],
    ) -> AppResult<Option<Session>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .rev()
            .find(|s| s.identity == identity && statuses.contains(&s.status))
            .cloned())
    }

    async fn acquire_insertion_lock(
        &self,
        identity: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i64>> {
        let mut state = self.state.lock().await;

        if let Some(holder) = state.slot_holder() {
            debug!(holder = holder, identity = %identity, "Insertion slot busy");
            return Ok(None);
        }

        let reusable = state
            .sessions
            .values_mut()
            .rev()
            .find(|s| s.identity == identity && s.status == SessionStatus::AwaitingInsertion);

        if let Some(session) = reusable {
            session.status = SessionStatus::Inserting;
            session.ip_address = ip_address.to_string();
            session.inserting_since = Some(now);
            session.updated_at = now;
            return Ok(Some(session.id));
        }

        Ok(Some(state.insert(
            identity,
            ip_address,
            SessionStatus::Inserting,
            now,
        )))
    }

    async fn release_insertion_lock(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&id) {
            Some(session) if session.status == SessionStatus::Inserting => {
                session.status = SessionStatus::AwaitingInsertion;
                session.inserting_since = None;
                session.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_status(
        &self,
        id: i64,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        if !status.is_pre_active() {
            return Err(AppError::validation(format!(
                "'{status}' is not a pre-active status"
            )));
        }

        let mut state = self.state.lock().await;
        let holder = state.slot_holder();

        let Some(session) = state.sessions.get_mut(&id) else {
            return Err(guard_failed(None, id, REASON_INVALID_TRANSITION));
        };
        if !session.status.is_pre_active() {
            return Err(guard_failed(Some(session.clone()), id, REASON_INVALID_TRANSITION));
        }
        if status == SessionStatus::Inserting && holder.is_some_and(|h| h != id) {
            return Err(AppError::busy("Another device is currently inserting a bottle"));
        }

        session.status = status;
        session.inserting_since = (status == SessionStatus::Inserting).then_some(now);
        session.updated_at = now;
        Ok(session.clone())
    }

    async fn add_bottle(
        &self,
        id: i64,
        seconds_per_bottle: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&id) {
            Some(session) if session.status.is_pre_active() => {
                session.bottles_inserted += 1;
                session.seconds_earned += seconds_per_bottle;
                if session.status == SessionStatus::Inserting {
                    // The holder is still at the machine.
                    session.inserting_since = Some(now);
                }
                session.updated_at = now;
                Ok(session.clone())
            }
            other => Err(guard_failed(other.cloned(), id, REASON_NOT_ACCEPTING)),
        }
    }

    async fn start_session(&self, id: i64, start: DateTime<Utc>) -> AppResult<Session> {
        let mut state = self.state.lock().await;
        if let Some(identity) = state.sessions.get(&id).map(|s| s.identity.clone()) {
            if let Some(active) = state.active_for_identity(&identity).filter(|a| *a != id) {
                return Err(already_active(id, active));
            }
        }

        match state.sessions.get_mut(&id) {
            Some(session) if session.status.is_pre_active() && session.bottles_inserted > 0 => {
                session.status = SessionStatus::Active;
                session.session_start = Some(start);
                session.session_end = Some(start + Duration::seconds(session.seconds_earned));
                session.inserting_since = None;
                session.updated_at = start;
                Ok(session.clone())
            }
            other => Err(start_failed(other.cloned(), id)),
        }
    }

    async fn extend_session(
        &self,
        id: i64,
        extra_seconds: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Extension> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&id) {
            Some(session) if session.status == SessionStatus::Active => {
                let end = session.session_end.unwrap_or(now);
                let new_end = end + Duration::seconds(extra_seconds);
                session.session_end = Some(new_end);
                session.bottles_inserted += 1;
                session.seconds_earned += extra_seconds;
                session.updated_at = now;
                Ok(Extension {
                    new_end,
                    bottles_inserted: session.bottles_inserted,
                })
            }
            other => Err(guard_failed(other.cloned(), id, REASON_NOT_ACCEPTING)),
        }
    }

    async fn revoke_session(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<Session>> {
        Ok(self.state.lock().await.finish(id, SessionStatus::Revoked, at))
    }

    async fn expire_session(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<Session>> {
        Ok(self.state.lock().await.finish(id, SessionStatus::Expired, at))
    }

    async fn expire_if_due(&self, id: i64, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        let mut state = self.state.lock().await;
        let due = state.sessions.get(&id).is_some_and(|s| {
            s.status == SessionStatus::Active && s.session_end.is_some_and(|end| end <= now)
        });
        if !due {
            return Ok(None);
        }
        Ok(state.finish(id, SessionStatus::Expired, now))
    }

    async fn list_active(&self) -> AppResult<Vec<Session>> {
        let state = self.state.lock().await;
        let mut active: Vec<Session> = state
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .cloned()
            .collect();
        active.sort_by_key(|s| s.session_end);
        Ok(active)
    }

    async fn release_stale_insertions(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i64>> {
        let mut state = self.state.lock().await;
        let mut released = Vec::new();
        for session in state.sessions.values_mut() {
            let stale = session.status == SessionStatus::Inserting
                && session.inserting_since.is_some_and(|since| since < cutoff);
            if stale {
                session.status = SessionStatus::AwaitingInsertion;
                session.inserting_since = None;
                session.updated_at = now;
                released.push(session.id);
            }
        }
        Ok(released)
    }

    async fn update_ip(&self, id: i64, ip_address: &str, now: DateTime<Utc>) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(session) = state.sessions.get_mut(&id).filter(|s| !s.is_terminal()) {
            session.ip_address = ip_address.to_string();
            session.updated_at = now;
        }
        Ok(())
    }

    async fn submit_rating(&self, rating: &NewRating, now: DateTime<Utc>) -> AppResult<Rating> {
        let mut state = self.state.lock().await;

        let Some(session) = state.sessions.get_mut(&rating.session_id) else {
            return Err(AppError::not_found(format!(
                "Session {} not found",
                rating.session_id
            )));
        };
        if session.rating.is_none() {
            session.rating = rating.rating;
        }

        state.last_rating_id += 1;
        let stored = Rating {
            id: state.last_rating_id,
            session_id: rating.session_id,
            rating: rating.rating,
            answers: rating.answers_json(),
            comment: rating.comment.clone(),
            created_at: now,
        };
        state.ratings.push(stored.clone());
        Ok(stored)
    }
}
