//! Network access enforcement.

use async_trait::async_trait;

use crate::result::AppResult;

/// Grants and revokes network access for a client address.
///
/// Calls are best-effort and idempotent: granting the same `(ip, seconds)`
/// twice or revoking an address that has no access must be harmless.
/// Callers log failures and do not retry; retries are the backend's concern.
#[async_trait]
pub trait AccessEnforcer: Send + Sync + 'static {
    /// Allow `ip` through the captive portal for `duration_seconds`.
    async fn grant(&self, ip: &str, duration_seconds: i64) -> AppResult<()>;

    /// Remove access for `ip`.
    async fn revoke(&self, ip: &str) -> AppResult<()>;
}
