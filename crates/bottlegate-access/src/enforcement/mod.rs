//! Network access enforcement backends.
//!
//! Enforcement is best-effort: a failed grant or revoke is logged and never
//! unwinds a session transition that has already been stored.

pub mod command;
pub mod dispatch;
pub mod logging;

pub use command::CommandEnforcer;
pub use dispatch::EnforcerDispatch;
pub use logging::LoggingEnforcer;

use tracing::{info, warn};

use bottlegate_core::traits::AccessEnforcer;
use bottlegate_entity::session::Session;

use crate::store::SessionStore;

/// Grant access for an activated session, logging failures.
pub(crate) async fn grant_access(enforcer: &dyn AccessEnforcer, session: &Session, seconds: i64) {
    if let Err(e) = enforcer.grant(&session.ip_address, seconds).await {
        warn!(
            session_id = session.id,
            ip = %session.ip_address,
            error = %e,
            "Failed to grant network access"
        );
    }
}

/// Revoke access for a session that just became terminal, logging failures.
///
/// The address is left open while another active session still uses it.
pub(crate) async fn revoke_access(
    store: &dyn SessionStore,
    enforcer: &dyn AccessEnforcer,
    session: &Session,
) {
    match store.list_active().await {
        Ok(active) => {
            if let Some(other) = active
                .iter()
                .find(|s| s.id != session.id && s.ip_address == session.ip_address)
            {
                info!(
                    session_id = session.id,
                    other_session_id = other.id,
                    ip = %session.ip_address,
                    "Address still covered by another active session, keeping access"
                );
                return;
            }
        }
        Err(e) => warn!(
            session_id = session.id,
            error = %e,
            "Failed to check other sessions on the address, revoking anyway"
        ),
    }

    if let Err(e) = enforcer.revoke(&session.ip_address).await {
        warn!(
            session_id = session.id,
            ip = %session.ip_address,
            error = %e,
            "Failed to revoke network access"
        );
    }
}
