//! Per-session expiry timers.
//!
//! The timer map is a cache over the store: it can be dropped at any time
//! and rebuilt by [`ExpiryReconciler`] from the active sessions.

pub mod reconciler;
pub mod scheduler;

pub use reconciler::{ExpiryReconciler, ReconcileReport};
pub use scheduler::ExpiryScheduler;
