//! One sleeping task per active session.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use bottlegate_core::traits::AccessEnforcer;
use bottlegate_entity::session::SessionStatus;

use crate::clock::Clock;
use crate::enforcement::revoke_access;
use crate::store::SessionStore;

/// Seconds before retrying a timer whose store call failed.
const RETRY_DELAY_SECONDS: i64 = 5;

/// A pending timer.
#[derive(Debug)]
struct TimerEntry {
    /// Identifies this particular scheduling of the session.
    token: u64,
    /// When the timer fires.
    deadline: DateTime<Utc>,
    /// The sleeping task.
    handle: JoinHandle<()>,
}

struct Inner {
    store: Arc<dyn SessionStore>,
    enforcer: Arc<dyn AccessEnforcer>,
    clock: Arc<dyn Clock>,
    timers: DashMap<i64, TimerEntry>,
    next_token: AtomicU64,
}

/// Schedules and cancels session expiry.
///
/// At most one timer exists per session; scheduling again aborts the
/// previous one. A firing timer expires the session only through
/// [`SessionStore::expire_if_due`], so a timer that lost a race with an
/// extension re-arms itself at the new end instead.
#[derive(Clone)]
pub struct ExpiryScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ExpiryScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryScheduler")
            .field("pending", &self.inner.timers.len())
            .finish()
    }
}

impl ExpiryScheduler {
    /// Creates a scheduler with no pending timers.
    pub fn new(
        store: Arc<dyn SessionStore>,
        enforcer: Arc<dyn AccessEnforcer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                enforcer,
                clock,
                timers: DashMap::new(),
                next_token: AtomicU64::new(1),
            }),
        }
    }

    /// Arm (or re-arm) the timer of session `id` to fire at `deadline`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, id: i64, deadline: DateTime<Utc>) {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let delay = (deadline - self.inner.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        match self.inner.timers.entry(id) {
            Entry::Occupied(mut entry) => {
                entry.get().handle.abort();
                let handle = self.spawn_timer(id, token, delay);
                entry.insert(TimerEntry {
                    token,
                    deadline,
                    handle,
                });
            }
            Entry::Vacant(entry) => {
                let handle = self.spawn_timer(id, token, delay);
                entry.insert(TimerEntry {
                    token,
                    deadline,
                    handle,
                });
            }
        }

        debug!(session_id = id, deadline = %deadline, "Expiry timer scheduled");
    }

    /// Drop the timer of session `id`, if any.
    pub fn cancel(&self, id: i64) {
        if let Some((_, entry)) = self.inner.timers.remove(&id) {
            entry.handle.abort();
            debug!(session_id = id, "Expiry timer cancelled");
        }
    }

    /// When the timer of session `id` fires, if one is pending.
    pub fn deadline(&self, id: i64) -> Option<DateTime<Utc>> {
        self.inner.timers.get(&id).map(|entry| entry.deadline)
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.inner.timers.len()
    }

    /// Abort every pending timer.
    pub fn shutdown(&self) {
        let count = self.inner.timers.len();
        self.inner.timers.retain(|_, entry| {
            entry.handle.abort();
            false
        });
        if count > 0 {
            info!(count = count, "Expiry timers stopped");
        }
    }

    fn spawn_timer(&self, id: i64, token: u64, delay: Duration) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(id, token).await;
        })
    }

    async fn fire(&self, id: i64, token: u64) {
        // Only the current scheduling of this session may act.
        if self
            .inner
            .timers
            .remove_if(&id, |_, entry| entry.token == token)
            .is_none()
        {
            return;
        }

        let now = self.inner.clock.now();
        match self.inner.store.expire_if_due(id, now).await {
            Ok(Some(session)) => {
                info!(
                    session_id = id,
                    identity = %session.identity,
                    ip = %session.ip_address,
                    "Session expired"
                );
                revoke_access(
                    self.inner.store.as_ref(),
                    self.inner.enforcer.as_ref(),
                    &session,
                )
                .await;
            }
            Ok(None) => self.revalidate(id).await,
            Err(e) => {
                error!(session_id = id, error = %e, "Failed to expire session, retrying");
                self.retry(id, now);
            }
        }
    }

    /// Re-arm a timer that fired early relative to the stored end.
    async fn revalidate(&self, id: i64) {
        match self.inner.store.get_session(id).await {
            Ok(Some(session)) if session.status == SessionStatus::Active => {
                if let Some(end) = session.session_end {
                    debug!(session_id = id, end = %end, "Session was extended, re-arming timer");
                    self.schedule(id, end);
                }
            }
            Ok(_) => debug!(session_id = id, "Timer fired for a session that is no longer active"),
            Err(e) => {
                error!(session_id = id, error = %e, "Failed to re-read session, retrying");
                self.retry(id, self.inner.clock.now());
            }
        }
    }

    fn retry(&self, id: i64, now: DateTime<Utc>) {
        self.schedule(id, now + chrono::Duration::seconds(RETRY_DELAY_SECONDS));
    }
}
