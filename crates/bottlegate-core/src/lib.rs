//! # bottlegate-core
//!
//! Core crate for BottleGate. Contains the configuration schemas, the
//! collaborator traits (MAC resolution and network enforcement), and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other BottleGate crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use result::AppResult;
