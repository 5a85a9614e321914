//! Session state machine and the insertion-timeout sweeper.

pub mod controller;
pub mod sweeper;

pub use controller::{Claim, LookupOutcome, SessionController};
pub use sweeper::InsertionSweeper;
