//! Custom Axum extractors.

pub mod client_ip;
pub mod device;
pub mod json;

pub use client_ip::ClientIp;
pub use device::{remember_device, resolve_device};
pub use json::OptionalJson;
