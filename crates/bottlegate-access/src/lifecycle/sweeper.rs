//! Insertion sweeper: frees the slot from claims nobody finished.

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::sync::watch;
use tokio::time;
use tracing::{error, info};

use bottlegate_core::config::SessionConfig;
use bottlegate_core::result::AppResult;

use crate::clock::Clock;
use crate::store::SessionStore;

/// Periodically moves stale `inserting` sessions back to `awaiting_insertion`.
#[derive(Clone)]
pub struct InsertionSweeper {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    /// How long a claim may be held.
    timeout: ChronoDuration,
    /// Pause between sweeps.
    interval: Duration,
}

impl std::fmt::Debug for InsertionSweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsertionSweeper")
            .field("timeout", &self.timeout)
            .field("interval", &self.interval)
            .finish()
    }
}

impl InsertionSweeper {
    /// Creates a sweeper using the session timing configuration.
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, config: &SessionConfig) -> Self {
        Self {
            store,
            clock,
            timeout: ChronoDuration::seconds(config.insertion_timeout_seconds),
            interval: Duration::from_secs(config.sweep_interval_seconds.max(1)),
        }
    }

    /// Runs a single sweep, returning the released session ids.
    pub async fn sweep(&self) -> AppResult<Vec<i64>> {
        let now = self.clock.now();
        let released = self
            .store
            .release_stale_insertions(now - self.timeout, now)
            .await?;

        for id in &released {
            info!(session_id = id, "Released abandoned insertion slot");
        }

        Ok(released)
    }

    /// Sweep until the shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            timeout_seconds = self.timeout.num_seconds(),
            interval_seconds = self.interval.as_secs(),
            "Insertion sweeper started"
        );

        loop {
            if let Err(e) = self.sweep().await {
                error!(error = %e, "Insertion sweep failed");
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = time::sleep(self.interval) => {}
            }
        }

        info!("Insertion sweeper stopped");
    }
}
