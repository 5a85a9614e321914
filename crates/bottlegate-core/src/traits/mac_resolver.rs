//! IP to link-layer address resolution.

use async_trait::async_trait;

/// Resolves a client IP address to its MAC address.
///
/// Implementations must never fail: any lookup problem is reported as
/// `None` so callers can fall back to another identity source.
#[async_trait]
pub trait MacResolver: Send + Sync + 'static {
    /// Returns the lowercase MAC for `ip`, if one is known.
    async fn resolve(&self, ip: &str) -> Option<String>;
}
