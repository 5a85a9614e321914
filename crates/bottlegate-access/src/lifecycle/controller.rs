//! Session lifecycle controller.
//!
//! Drives the state machine
//!
//! ```text
//! awaiting_insertion --claim--> inserting --bottle--> inserting
//! awaiting_insertion | inserting --activate (bottles > 0)--> active
//! active --bottle--> active (end extended, timer re-armed)
//! active --timer | expire--> expired
//! any non-terminal --expire--> expired, --revoke--> revoked
//! ```
//!
//! and coordinates the store, the expiry timers and the access enforcer.
//! Every transition is committed in the store first; enforcement follows and
//! its failures are only logged.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use bottlegate_core::config::SessionConfig;
use bottlegate_core::error::{AppError, ErrorKind};
use bottlegate_core::result::AppResult;
use bottlegate_core::traits::AccessEnforcer;
use bottlegate_entity::rating::{NewRating, Rating};
use bottlegate_entity::session::{Session, SessionStatus};

use crate::clock::Clock;
use crate::enforcement::{grant_access, revoke_access};
use crate::store::SessionStore;
use crate::store::backend::REASON_NOT_ACCEPTING;
use crate::timer::{ExpiryReconciler, ExpiryScheduler};

/// Result of trying to claim the insertion slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The slot now belongs to this session.
    Acquired(i64),
    /// Another session holds the slot; try again later.
    Busy,
    /// The device already has access through this session. Further bottles
    /// extend it instead of opening a second one.
    Active(i64),
}

/// Result of a portal session lookup.
#[derive(Debug, Clone, Serialize)]
pub struct LookupOutcome {
    /// An existing session was found for the device.
    pub found: bool,
    /// The found session was handed back to the device.
    pub resumed: bool,
    /// The resumed or newly created session.
    pub session: Session,
}

/// Coordinates session transitions, timers and access grants.
#[derive(Clone)]
pub struct SessionController {
    store: Arc<dyn SessionStore>,
    enforcer: Arc<dyn AccessEnforcer>,
    clock: Arc<dyn Clock>,
    scheduler: ExpiryScheduler,
    config: SessionConfig,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("store", &self.store)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl SessionController {
    /// Creates a controller with its own expiry scheduler.
    pub fn new(
        store: Arc<dyn SessionStore>,
        enforcer: Arc<dyn AccessEnforcer>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let scheduler = ExpiryScheduler::new(store.clone(), enforcer.clone(), clock.clone());
        Self {
            store,
            enforcer,
            clock,
            scheduler,
            config,
        }
    }

    /// The expiry scheduler owned by this controller.
    pub fn scheduler(&self) -> &ExpiryScheduler {
        &self.scheduler
    }

    /// A reconciler that arms this controller's timers.
    pub fn reconciler(&self) -> ExpiryReconciler {
        ExpiryReconciler::new(
            self.store.clone(),
            self.enforcer.clone(),
            self.scheduler.clone(),
            self.clock.clone(),
        )
    }

    /// Session timing configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // -- Insertion slot --

    /// Claim the insertion slot for a device.
    ///
    /// A device with a live active session gets that session back instead.
    pub async fn claim(&self, identity: &str, ip: &str) -> AppResult<Claim> {
        if let Some(active) = self.live_active_session(identity).await? {
            let id = active.id;
            debug!(session_id = id, identity = %identity, "Device already has access");
            self.refresh_ip(active, ip).await?;
            return Ok(Claim::Active(id));
        }

        let now = self.clock.now();
        match self.store.acquire_insertion_lock(identity, ip, now).await? {
            Some(id) => {
                info!(session_id = id, identity = %identity, ip = %ip, "Insertion slot acquired");
                Ok(Claim::Acquired(id))
            }
            None => {
                debug!(identity = %identity, ip = %ip, "Insertion slot busy");
                Ok(Claim::Busy)
            }
        }
    }

    /// Release the slot if this device holds it. Returns the released session.
    pub async fn release(&self, identity: &str) -> AppResult<Option<i64>> {
        let holder = self
            .store
            .get_session_for_device(identity, &[SessionStatus::Inserting])
            .await?;

        let Some(session) = holder else {
            return Ok(None);
        };

        let released = self
            .store
            .release_insertion_lock(session.id, self.clock.now())
            .await?;
        if released {
            info!(session_id = session.id, identity = %identity, "Insertion slot released");
        }
        Ok(released.then_some(session.id))
    }

    // -- Bottles and activation --

    /// Redeem the bottles of a pre-active session as network access.
    pub async fn activate(&self, id: i64) -> AppResult<Session> {
        let session = self.store.start_session(id, self.clock.now()).await?;

        if let Some(end) = session.session_end {
            self.scheduler.schedule(id, end);
        }

        info!(
            session_id = id,
            identity = %session.identity,
            ip = %session.ip_address,
            bottles = session.bottles_inserted,
            seconds = session.seconds_earned,
            "Session activated"
        );

        grant_access(self.enforcer.as_ref(), &session, session.seconds_earned).await;
        Ok(session)
    }

    /// Apply one detected bottle to a session.
    ///
    /// Pre-active sessions accumulate credit; active sessions are extended
    /// immediately. Terminal sessions reject the bottle.
    pub async fn handle_bottle_event(&self, id: i64) -> AppResult<Session> {
        let session = self.require(id).await?;

        match session.status {
            SessionStatus::Active => self.extend(session).await,
            status if status.is_pre_active() => {
                match self
                    .store
                    .add_bottle(id, self.config.seconds_per_bottle, self.clock.now())
                    .await
                {
                    Ok(updated) => {
                        info!(
                            session_id = id,
                            bottles = updated.bottles_inserted,
                            seconds = updated.seconds_earned,
                            "Bottle credited"
                        );
                        Ok(updated)
                    }
                    // Activated between the read and the write.
                    Err(e) if e.kind == ErrorKind::InvalidState => {
                        let current = self.require(id).await?;
                        if current.status == SessionStatus::Active {
                            self.extend(current).await
                        } else {
                            Err(e)
                        }
                    }
                    Err(e) => Err(e),
                }
            }
            status => Err(AppError::invalid_state(
                REASON_NOT_ACCEPTING,
                format!("Session {id} is {status} and does not accept bottles"),
            )),
        }
    }

    async fn extend(&self, session: Session) -> AppResult<Session> {
        let id = session.id;
        let now = self.clock.now();
        let extension = self
            .store
            .extend_session(id, self.config.seconds_per_bottle, now)
            .await?;

        self.scheduler.schedule(id, extension.new_end);

        info!(
            session_id = id,
            bottles = extension.bottles_inserted,
            session_end = %extension.new_end,
            "Session extended"
        );

        let updated = self.require(id).await?;
        let remaining = (extension.new_end - now).num_seconds().max(0);
        grant_access(self.enforcer.as_ref(), &updated, remaining).await;
        Ok(updated)
    }

    // -- Termination --

    /// Expire a session now. Expiring a terminal session returns it unchanged.
    pub async fn expire(&self, id: i64) -> AppResult<Session> {
        self.finish(id, SessionStatus::Expired).await
    }

    /// Revoke a session now. Revoking a terminal session returns it unchanged.
    pub async fn revoke(&self, id: i64) -> AppResult<Session> {
        self.finish(id, SessionStatus::Revoked).await
    }

    async fn finish(&self, id: i64, status: SessionStatus) -> AppResult<Session> {
        let now = self.clock.now();
        let finished = match status {
            SessionStatus::Revoked => self.store.revoke_session(id, now).await?,
            _ => self.store.expire_session(id, now).await?,
        };

        match finished {
            Some(session) => {
                self.scheduler.cancel(id);
                info!(
                    session_id = id,
                    identity = %session.identity,
                    ip = %session.ip_address,
                    status = %session.status,
                    "Session ended"
                );
                revoke_access(self.store.as_ref(), self.enforcer.as_ref(), &session).await;
                Ok(session)
            }
            None => {
                let session = self.require(id).await?;
                debug!(session_id = id, status = %session.status, "Session already ended");
                Ok(session)
            }
        }
    }

    // -- Portal --

    /// Resume the device's current session or open a new one.
    ///
    /// An active session with time left is always resumed; a pre-active one
    /// only while younger than the resume window.
    pub async fn lookup(&self, identity: &str, ip: &str) -> AppResult<LookupOutcome> {
        let now = self.clock.now();
        let existing = match self.live_active_session(identity).await? {
            Some(active) => Some(active),
            None => {
                self.store
                    .get_session_for_device(identity, &SessionStatus::NON_TERMINAL)
                    .await?
            }
        };

        if let Some(session) = existing {
            let resumable = match session.status {
                SessionStatus::Active => session.is_live(now),
                _ => session.age_seconds(now) < self.config.resume_window_seconds,
            };

            if resumable {
                debug!(
                    session_id = session.id,
                    identity = %identity,
                    status = %session.status,
                    "Resuming session"
                );
                let session = self.refresh_ip(session, ip).await?;
                return Ok(LookupOutcome {
                    found: true,
                    resumed: true,
                    session,
                });
            }
        }

        let session = self
            .create(identity, ip, SessionStatus::AwaitingInsertion)
            .await?;
        Ok(LookupOutcome {
            found: false,
            resumed: false,
            session,
        })
    }

    /// Make sure a device probing for a captive portal has a session.
    ///
    /// Any non-terminal session is reused regardless of age.
    pub async fn ensure_session(&self, identity: &str, ip: &str) -> AppResult<Session> {
        let existing = self
            .store
            .get_session_for_device(identity, &SessionStatus::NON_TERMINAL)
            .await?;

        match existing {
            Some(session) => self.refresh_ip(session, ip).await,
            None => {
                self.create(identity, ip, SessionStatus::AwaitingInsertion)
                    .await
            }
        }
    }

    /// The device's active session if it still has time left.
    ///
    /// An active session already past its end is expired on the spot, since
    /// its timer has not caught up yet.
    async fn live_active_session(&self, identity: &str) -> AppResult<Option<Session>> {
        let Some(session) = self
            .store
            .get_session_for_device(identity, &[SessionStatus::Active])
            .await?
        else {
            return Ok(None);
        };

        let now = self.clock.now();
        if session.is_live(now) {
            return Ok(Some(session));
        }

        if let Some(expired) = self.store.expire_if_due(session.id, now).await? {
            self.scheduler.cancel(expired.id);
            info!(session_id = expired.id, identity = %identity, "Overdue session expired");
            revoke_access(self.store.as_ref(), self.enforcer.as_ref(), &expired).await;
        }
        Ok(None)
    }

    async fn create(&self, identity: &str, ip: &str, status: SessionStatus) -> AppResult<Session> {
        let id = self
            .store
            .create_session(identity, ip, status, self.clock.now())
            .await?;
        info!(session_id = id, identity = %identity, ip = %ip, "Session created");
        self.require(id).await
    }

    async fn refresh_ip(&self, mut session: Session, ip: &str) -> AppResult<Session> {
        if session.ip_address != ip {
            debug!(
                session_id = session.id,
                old_ip = %session.ip_address,
                new_ip = %ip,
                "Device address changed"
            );
            self.store.update_ip(session.id, ip, self.clock.now()).await?;
            session.ip_address = ip.to_string();
        }
        Ok(session)
    }

    // -- Administration and queries --

    /// Apply an administrative status change.
    ///
    /// Allowed targets are `awaiting_insertion` (releases a claim),
    /// `expired` and `revoked`.
    pub async fn set_status(&self, id: i64, status: SessionStatus) -> AppResult<Session> {
        match status {
            SessionStatus::AwaitingInsertion => {
                let session = self.store.update_status(id, status, self.clock.now()).await?;
                info!(session_id = id, status = %status, "Session status changed");
                Ok(session)
            }
            SessionStatus::Expired => self.expire(id).await,
            SessionStatus::Revoked => self.revoke(id).await,
            SessionStatus::Inserting | SessionStatus::Active => Err(AppError::validation(format!(
                "Status '{status}' can only be reached by claiming or activating"
            ))),
        }
    }

    /// Fetch a session.
    pub async fn status(&self, id: i64) -> AppResult<Session> {
        self.require(id).await
    }

    /// Store feedback for a session.
    pub async fn rate(&self, rating: &NewRating) -> AppResult<Rating> {
        let stored = self.store.submit_rating(rating, self.clock.now()).await?;
        info!(
            session_id = rating.session_id,
            rating = ?rating.rating,
            "Rating submitted"
        );
        Ok(stored)
    }

    async fn require(&self, id: i64) -> AppResult<Session> {
        self.store
            .get_session(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Session {id} not found")))
    }

    /// Seconds of access one bottle buys.
    pub fn seconds_per_bottle(&self) -> i64 {
        self.config.seconds_per_bottle
    }

    /// Seconds of access left on a session right now.
    pub fn remaining_seconds(&self, session: &Session) -> i64 {
        session.remaining_seconds(self.clock.now())
    }
}
