//! Startup reconciliation between stored sessions and in-memory timers.

use std::sync::Arc;

use tracing::{info, warn};

use bottlegate_core::result::AppResult;
use bottlegate_core::traits::AccessEnforcer;

use crate::clock::Clock;
use crate::enforcement::revoke_access;
use crate::store::SessionStore;

use super::scheduler::ExpiryScheduler;

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Sessions whose end had already passed and were expired.
    pub expired: usize,
    /// Sessions that received a timer.
    pub scheduled: usize,
}

/// Rebuilds expiry timers from the store.
///
/// Run once at startup, before serving requests: timers do not survive a
/// restart, so every active session needs a fresh one and any session whose
/// end passed while the process was down is expired immediately.
#[derive(Clone)]
pub struct ExpiryReconciler {
    store: Arc<dyn SessionStore>,
    enforcer: Arc<dyn AccessEnforcer>,
    scheduler: ExpiryScheduler,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ExpiryReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryReconciler").finish()
    }
}

impl ExpiryReconciler {
    /// Creates a new reconciler.
    pub fn new(
        store: Arc<dyn SessionStore>,
        enforcer: Arc<dyn AccessEnforcer>,
        scheduler: ExpiryScheduler,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            enforcer,
            scheduler,
            clock,
        }
    }

    /// Expire past-due sessions and arm timers for the rest.
    pub async fn reconcile(&self) -> AppResult<ReconcileReport> {
        let active = self.store.list_active().await?;
        let now = self.clock.now();
        let mut report = ReconcileReport::default();

        for session in active {
            let Some(end) = session.session_end else {
                warn!(session_id = session.id, "Active session without an end time");
                continue;
            };

            if end > now {
                self.scheduler.schedule(session.id, end);
                report.scheduled += 1;
                continue;
            }

            if let Some(expired) = self.store.expire_if_due(session.id, now).await? {
                revoke_access(self.store.as_ref(), self.enforcer.as_ref(), &expired).await;
                report.expired += 1;
            }
        }

        info!(
            expired = report.expired,
            scheduled = report.scheduled,
            "Expiry timers reconciled"
        );

        Ok(report)
    }
}
