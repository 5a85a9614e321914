//! HTTP request handlers.

pub mod bottle;
pub mod captive;
pub mod dev;
pub mod health;
pub mod rating;
pub mod session;
