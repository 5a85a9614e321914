//! # bottlegate-database
//!
//! PostgreSQL connection management and the repositories backing the
//! session store.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
