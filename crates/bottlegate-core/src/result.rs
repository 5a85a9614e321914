//! Convenience result type alias for BottleGate.

use crate::error::AppError;

/// A specialized `Result` type for BottleGate operations.
pub type AppResult<T> = Result<T, AppError>;
