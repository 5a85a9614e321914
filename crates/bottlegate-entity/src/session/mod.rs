//! Session entities.

pub mod model;
pub mod status;

pub use model::{Extension, Session};
pub use status::SessionStatus;
