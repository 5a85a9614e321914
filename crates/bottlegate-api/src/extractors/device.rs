//! Device identity helpers shared by the portal handlers.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use bottlegate_access::identity::DEVICE_COOKIE;
use bottlegate_access::{RequestIdentity, ResolvedIdentity};

use crate::state::AppState;

/// Resolve the device behind a request.
pub async fn resolve_device(
    state: &AppState,
    client_ip: &str,
    explicit_mac: Option<String>,
    jar: &CookieJar,
) -> ResolvedIdentity {
    let request = RequestIdentity {
        client_ip: client_ip.to_string(),
        explicit_mac,
        device_cookie: jar.get(DEVICE_COOKIE).map(|c| c.value().to_string()),
    };
    state.identity.resolve(&request).await
}

/// Persist a freshly issued device token, if any.
pub fn remember_device(jar: CookieJar, device: &ResolvedIdentity, max_age_days: i64) -> CookieJar {
    match device.cookie_to_set() {
        Some(token) => jar.add(device_cookie(token.to_string(), max_age_days)),
        None => jar,
    }
}

/// The `device_id` cookie carrying `token`.
pub fn device_cookie(token: String, max_age_days: i64) -> Cookie<'static> {
    Cookie::build((DEVICE_COOKIE, token))
        .path("/")
        .max_age(time::Duration::days(max_age_days))
        .same_site(SameSite::Lax)
        .http_only(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_attributes() {
        let cookie = device_cookie("abc".to_string(), 1825);
        assert_eq!(cookie.name(), "device_id");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(1825)));
    }

    #[test]
    fn test_only_fresh_tokens_are_persisted() {
        let fresh = ResolvedIdentity::Cookie {
            token: "new".to_string(),
            fresh: true,
        };
        let known = ResolvedIdentity::Cookie {
            token: "old".to_string(),
            fresh: false,
        };

        assert!(remember_device(CookieJar::new(), &fresh, 1).get(DEVICE_COOKIE).is_some());
        assert!(remember_device(CookieJar::new(), &known, 1).get(DEVICE_COOKIE).is_none());
    }
}
