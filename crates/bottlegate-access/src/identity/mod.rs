//! Device identity resolution.

pub mod mac;
pub mod resolver;

pub use mac::SystemMacResolver;
pub use resolver::{
    DEVICE_COOKIE, DEVICE_PREFIX, IdentityResolver, RequestIdentity, ResolvedIdentity,
};
