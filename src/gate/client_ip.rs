//! Best-effort client address for rate-limit keys.

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Placeholder used when no address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Client address resolved by the gate, stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// Derives the client address.
///
/// With `trust_forwarded` set, the first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`. Otherwise (or when neither is present) the socket peer is
/// used, and `"unknown"` when that is unavailable too.
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer.map_or_else(|| UNKNOWN_CLIENT.to_string(), |addr| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_first_forwarded_entry_wins() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_ip(&h, None, true), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_then_peer_then_unknown() {
        let h = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&h, None, true), "198.51.100.2");

        let peer: SocketAddr = "192.0.2.1:55000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), "192.0.2.1");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_untrusted_headers_are_ignored() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7")]);
        let peer: SocketAddr = "192.0.2.1:55000".parse().unwrap();
        assert_eq!(client_ip(&h, Some(peer), false), "192.0.2.1");
    }
}
