//! Session engine configuration.

use serde::{Deserialize, Serialize};

/// Which store backs the session engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackend {
    /// PostgreSQL; safe across multiple server processes.
    #[default]
    Postgres,
    /// In-process store for single-node demos and tests.
    Memory,
}

/// Session engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session store backend.
    #[serde(default)]
    pub backend: SessionBackend,
    /// Seconds of network access earned per bottle.
    #[serde(default = "default_seconds_per_bottle")]
    pub seconds_per_bottle: i64,
    /// Age under which a non-active session is resumed instead of replaced.
    #[serde(default = "default_resume_window")]
    pub resume_window_seconds: i64,
    /// How long a session may hold the insertion slot before it is released.
    #[serde(default = "default_insertion_timeout")]
    pub insertion_timeout_seconds: i64,
    /// Interval between insertion-timeout sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Lifetime of the `device_id` cookie in days.
    #[serde(default = "default_cookie_max_age_days")]
    pub cookie_max_age_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            seconds_per_bottle: default_seconds_per_bottle(),
            resume_window_seconds: default_resume_window(),
            insertion_timeout_seconds: default_insertion_timeout(),
            sweep_interval_seconds: default_sweep_interval(),
            cookie_max_age_days: default_cookie_max_age_days(),
        }
    }
}

fn default_seconds_per_bottle() -> i64 {
    120
}

fn default_resume_window() -> i64 {
    600
}

fn default_insertion_timeout() -> i64 {
    180
}

fn default_sweep_interval() -> u64 {
    15
}

fn default_cookie_max_age_days() -> i64 {
    365 * 5
}
