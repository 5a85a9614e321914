//! # bottlegate-access
//!
//! The session and access-grant engine of BottleGate.
//!
//! ## Modules
//!
//! - `identity`: device identity resolution (explicit MAC, ARP/lease lookup, cookie)
//! - `store`: session persistence with the atomic insertion-slot claim
//! - `enforcement`: network access grant/revoke backends
//! - `timer`: per-session expiry timers and startup reconciliation
//! - `lifecycle`: the session state machine and the insertion-timeout sweeper
//! - `clock`: wall-clock abstraction shared by the controller and timers

pub mod clock;
pub mod enforcement;
pub mod identity;
pub mod lifecycle;
pub mod store;
pub mod timer;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, SystemClock, TokioClock};
pub use enforcement::EnforcerDispatch;
pub use identity::{IdentityResolver, RequestIdentity, ResolvedIdentity, SystemMacResolver};
pub use lifecycle::{Claim, InsertionSweeper, LookupOutcome, SessionController};
pub use store::{MemorySessionStore, PgSessionStore, SessionStore, SessionStoreDispatch};
pub use timer::{ExpiryReconciler, ExpiryScheduler};
