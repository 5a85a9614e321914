//! Client address extraction.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

/// Header set by a reverse proxy with the original client address.
const REAL_IP_HEADER: &str = "x-real-ip";
/// Standard proxy chain header; the first entry is the client.
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
/// Used when no address is known at all.
const UNKNOWN_ADDRESS: &str = "0.0.0.0";

/// The request's source address as a string.
///
/// The socket peer address wins; proxy headers are consulted only when the
/// server was started without connection info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ConnectInfo(addr)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            return Ok(Self(addr.ip().to_string()));
        }

        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let ip = header(REAL_IP_HEADER)
            .or_else(|| header(FORWARDED_FOR_HEADER))
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());
        Ok(Self(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> String {
        let (mut parts, _) = request.into_parts();
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        ip
    }

    #[tokio::test]
    async fn test_connect_info_wins_over_headers() {
        let mut request = Request::builder()
            .header("x-real-ip", "10.9.9.9")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 4, 10], 51000))));

        assert_eq!(extract(request).await, "192.168.4.10");
    }

    #[tokio::test]
    async fn test_forwarded_for_first_hop() {
        let request = Request::builder()
            .header("x-forwarded-for", "192.168.4.22, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, "192.168.4.22");

        let bare = Request::builder().body(()).unwrap();
        assert_eq!(extract(bare).await, "0.0.0.0");
    }
}
