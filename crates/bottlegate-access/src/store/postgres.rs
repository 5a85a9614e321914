//! Postgres-backed session store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bottlegate_core::error::AppError;
use bottlegate_core::result::AppResult;
use bottlegate_database::repositories::{RatingRepository, SessionRepository};
use bottlegate_entity::rating::{NewRating, Rating};
use bottlegate_entity::session::{Extension, Session, SessionStatus};

use super::backend::{
    REASON_INVALID_TRANSITION, REASON_NOT_ACCEPTING, SessionStore, guard_failed, start_failed,
};

/// Session store sharing state through Postgres.
///
/// The insertion slot is enforced by the database, so any number of server
/// processes may use the same database.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    sessions: Arc<SessionRepository>,
    ratings: Arc<RatingRepository>,
}

impl PgSessionStore {
    /// Creates a store over the given repositories.
    pub fn new(sessions: Arc<SessionRepository>, ratings: Arc<RatingRepository>) -> Self {
        Self { sessions, ratings }
    }

    async fn explain(&self, id: i64, code: &'static str) -> AppError {
        match self.sessions.find_by_id(id).await {
            Ok(session) => guard_failed(session, id, code),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(
        &self,
        identity: &str,
        ip_address: &str,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<i64> {
        self.sessions.create(identity, ip_address, status, now).await
    }

    async fn get_session(&self, id: i64) -> AppResult<Option<Session>> {
        self.sessions.find_by_id(id).await
    }

    async fn get_session_for_device(
        &self,
        identity: &str,
        statuses: &[SessionStatus],
    ) -> AppResult<Option<Session>> {
        self.sessions.find_latest_for_identity(identity, statuses).await
    }

    async fn acquire_insertion_lock(
        &self,
        identity: &str,
        ip_address: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i64>> {
        self.sessions.claim_insertion(identity, ip_address, now).await
    }

    async fn release_insertion_lock(&self, id: i64, now: DateTime<Utc>) -> AppResult<bool> {
        self.sessions.release_insertion(id, now).await
    }

    async fn update_status(
        &self,
        id: i64,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        match self.sessions.set_pre_active_status(id, status, now).await? {
            Some(session) => Ok(session),
            None => Err(self.explain(id, REASON_INVALID_TRANSITION).await),
        }
    }

    async fn add_bottle(
        &self,
        id: i64,
        seconds_per_bottle: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Session> {
        match self.sessions.add_bottle(id, seconds_per_bottle, now).await? {
            Some(session) => Ok(session),
            None => Err(self.explain(id, REASON_NOT_ACCEPTING).await),
        }
    }

    async fn start_session(&self, id: i64, start: DateTime<Utc>) -> AppResult<Session> {
        match self.sessions.start(id, start).await? {
            Some(session) => Ok(session),
            None => Err(start_failed(self.sessions.find_by_id(id).await?, id)),
        }
    }

    async fn extend_session(
        &self,
        id: i64,
        extra_seconds: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Extension> {
        match self.sessions.extend(id, extra_seconds, now).await? {
            Some(extension) => Ok(extension),
            None => Err(self.explain(id, REASON_NOT_ACCEPTING).await),
        }
    }

    async fn revoke_session(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<Session>> {
        self.sessions.finish(id, SessionStatus::Revoked, at).await
    }

    async fn expire_session(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<Session>> {
        self.sessions.finish(id, SessionStatus::Expired, at).await
    }

    async fn expire_if_due(&self, id: i64, now: DateTime<Utc>) -> AppResult<Option<Session>> {
        self.sessions.expire_if_due(id, now).await
    }

    async fn list_active(&self) -> AppResult<Vec<Session>> {
        self.sessions.find_active().await
    }

    async fn release_stale_insertions(
        &self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i64>> {
        self.sessions.release_stale_insertions(cutoff, now).await
    }

    async fn update_ip(&self, id: i64, ip_address: &str, now: DateTime<Utc>) -> AppResult<()> {
        self.sessions.update_ip(id, ip_address, now).await
    }

    async fn submit_rating(&self, rating: &NewRating, _now: DateTime<Utc>) -> AppResult<Rating> {
        self.ratings.create(rating).await
    }
}
