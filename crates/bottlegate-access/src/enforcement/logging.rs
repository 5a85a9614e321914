//! Enforcer that only records decisions in the log.

use async_trait::async_trait;
use tracing::info;

use bottlegate_core::result::AppResult;
use bottlegate_core::traits::AccessEnforcer;

/// Logs grants and revocations without touching the network.
///
/// Used in development, with the mock sensor, and on hosts where the
/// firewall is managed elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEnforcer;

#[async_trait]
impl AccessEnforcer for LoggingEnforcer {
    async fn grant(&self, ip: &str, duration_seconds: i64) -> AppResult<()> {
        info!(ip = %ip, duration_seconds = duration_seconds, "Access granted");
        Ok(())
    }

    async fn revoke(&self, ip: &str) -> AppResult<()> {
        info!(ip = %ip, "Access revoked");
        Ok(())
    }
}
