//! Priority-chain resolution of a request to a device identity.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use bottlegate_core::traits::MacResolver;

/// Name of the cookie carrying a self-issued device token.
pub const DEVICE_COOKIE: &str = "device_id";

/// Namespace for cookie-based identities; never a valid MAC prefix.
pub const DEVICE_PREFIX: &str = "device:";

/// Sentinel some clients send when they cannot read their own MAC.
const UNKNOWN_MAC: &str = "unknown";

/// The request facts identity resolution works from.
#[derive(Debug, Clone, Default)]
pub struct RequestIdentity {
    /// Source address of the request.
    pub client_ip: String,
    /// MAC supplied by the client in the body or query string.
    pub explicit_mac: Option<String>,
    /// Value of the `device_id` cookie, if sent.
    pub device_cookie: Option<String>,
}

/// A resolved device identity, tagged by how much it can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ResolvedIdentity {
    /// MAC address supplied by the client itself.
    Explicit {
        /// The supplied address.
        mac: String,
    },
    /// MAC address found for the source IP on the LAN.
    Resolved {
        /// The discovered address.
        mac: String,
    },
    /// Self-issued token persisted in a cookie.
    Cookie {
        /// The bare token (without the `device:` prefix).
        token: String,
        /// Whether the token was generated for this request.
        fresh: bool,
    },
}

impl ResolvedIdentity {
    /// The identity string stored on sessions.
    pub fn identity(&self) -> String {
        match self {
            Self::Explicit { mac } | Self::Resolved { mac } => mac.clone(),
            Self::Cookie { token, .. } => format!("{DEVICE_PREFIX}{token}"),
        }
    }

    /// Whether the identity comes from the cookie fallback.
    pub fn is_cookie_based(&self) -> bool {
        matches!(self, Self::Cookie { .. })
    }

    /// Whether the caller must persist a freshly issued cookie.
    pub fn must_set_cookie(&self) -> bool {
        matches!(self, Self::Cookie { fresh: true, .. })
    }

    /// The cookie token to persist, when one was just issued.
    pub fn cookie_to_set(&self) -> Option<&str> {
        match self {
            Self::Cookie { token, fresh: true } => Some(token),
            _ => None,
        }
    }
}

/// Resolves requests to device identities.
///
/// Order, first match wins: explicit client MAC, MAC lookup of the source
/// address, `device_id` cookie, freshly generated token.
#[derive(Clone)]
pub struct IdentityResolver {
    mac_resolver: Arc<dyn MacResolver>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver").finish()
    }
}

impl IdentityResolver {
    /// Creates a resolver backed by the given MAC lookup.
    pub fn new(mac_resolver: Arc<dyn MacResolver>) -> Self {
        Self { mac_resolver }
    }

    /// Resolve the identity of a request.
    pub async fn resolve(&self, request: &RequestIdentity) -> ResolvedIdentity {
        if let Some(mac) = request
            .explicit_mac
            .as_deref()
            .filter(|m| !m.is_empty() && !m.eq_ignore_ascii_case(UNKNOWN_MAC))
        {
            debug!(mac = %mac, "Using client-provided MAC");
            return ResolvedIdentity::Explicit {
                mac: mac.to_string(),
            };
        }

        if let Some(mac) = self.mac_resolver.resolve(&request.client_ip).await {
            debug!(mac = %mac, ip = %request.client_ip, "Discovered MAC for client address");
            return ResolvedIdentity::Resolved { mac };
        }

        match request.device_cookie.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => ResolvedIdentity::Cookie {
                token: token.to_string(),
                fresh: false,
            },
            _ => {
                let token = Uuid::new_v4().to_string();
                debug!(token = %token, "Issued new device token");
                ResolvedIdentity::Cookie { token, fresh: true }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct FixedMac(Option<&'static str>);

    #[async_trait]
    impl MacResolver for FixedMac {
        async fn resolve(&self, _ip: &str) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn make_resolver(mac: Option<&'static str>) -> IdentityResolver {
        IdentityResolver::new(Arc::new(FixedMac(mac)))
    }

    fn request(explicit: Option<&str>, cookie: Option<&str>) -> RequestIdentity {
        RequestIdentity {
            client_ip: "192.168.4.20".to_string(),
            explicit_mac: explicit.map(str::to_string),
            device_cookie: cookie.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_explicit_mac_wins() {
        let resolver = make_resolver(Some("11:22:33:44:55:66"));
        let resolved = resolver
            .resolve(&request(Some("AA:BB:CC:DD:EE:FF"), Some("tok")))
            .await;

        assert_eq!(
            resolved,
            ResolvedIdentity::Explicit {
                mac: "AA:BB:CC:DD:EE:FF".to_string()
            }
        );
        assert_eq!(resolved.identity(), "AA:BB:CC:DD:EE:FF");
        assert!(!resolved.is_cookie_based());
        assert!(!resolved.must_set_cookie());
    }

    #[tokio::test]
    async fn test_unknown_sentinel_falls_through_to_lookup() {
        let resolver = make_resolver(Some("11:22:33:44:55:66"));
        let resolved = resolver.resolve(&request(Some("unknown"), None)).await;

        assert_eq!(
            resolved,
            ResolvedIdentity::Resolved {
                mac: "11:22:33:44:55:66".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_existing_cookie_is_reused() {
        let resolver = make_resolver(None);
        let resolved = resolver.resolve(&request(None, Some("abc-123"))).await;

        assert_eq!(resolved.identity(), "device:abc-123");
        assert!(resolved.is_cookie_based());
        assert!(!resolved.must_set_cookie());
        assert_eq!(resolved.cookie_to_set(), None);
    }

    #[tokio::test]
    async fn test_fresh_token_when_nothing_else_matches() {
        let resolver = make_resolver(None);
        let first = resolver.resolve(&request(None, None)).await;
        let second = resolver.resolve(&request(Some(""), Some("  "))).await;

        assert!(first.must_set_cookie());
        assert!(first.identity().starts_with(DEVICE_PREFIX));
        let token = first.cookie_to_set().expect("fresh token");
        assert!(Uuid::parse_str(token).is_ok());
        assert_ne!(first.identity(), second.identity());
    }
}
