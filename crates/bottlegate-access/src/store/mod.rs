//! Session persistence.
//!
//! [`SessionStore`] is the only owner of session state and of the
//! insertion slot. Every mutation is a single guarded step, so callers never
//! hold locks across awaits.

pub mod backend;
pub mod memory;
pub mod postgres;

pub use backend::{SessionStore, SessionStoreDispatch};
pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;
