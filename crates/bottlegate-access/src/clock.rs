//! Wall-clock abstraction.
//!
//! Session timestamps are UTC wall-clock values while timers sleep on
//! tokio's monotonic clock. [`TokioClock`] ties the two together so that
//! tests driving paused tokio time see a consistent wall clock.

use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

/// Source of the current UTC time.
pub trait Clock: Send + Sync + Debug + 'static {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A wall clock anchored at creation that advances with tokio's clock.
///
/// Under `tokio::time::pause` it moves only when tokio time is advanced.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    anchor_utc: DateTime<Utc>,
    anchor: Instant,
}

impl TokioClock {
    /// Anchor a new clock at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Anchor a new clock at `start`.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            anchor_utc: start,
            anchor: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Instant::now().saturating_duration_since(self.anchor);
        self.anchor_utc + Duration::from_std(elapsed).unwrap_or_else(|_| Duration::zero())
    }
}
