//! Collaborator traits defined in `bottlegate-core` and implemented by other crates.

pub mod enforcer;
pub mod mac_resolver;

pub use enforcer::AccessEnforcer;
pub use mac_resolver::MacResolver;
