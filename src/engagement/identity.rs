//! Caller identity for like deduplication.
//!
//! Derived from network headers, so it is best-effort per observed network
//! address: proxies can spoof it and NAT can share it.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

use crate::error::EngagementError;

/// Longest identity key accepted.
pub const MAX_IDENTITY_LENGTH: usize = 128;

/// Identity used when no header and no peer address is available.
pub const FALLBACK_IDENTITY: &str = "unknown";

/// Headers consulted in order, first non-blank wins.
const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const CDN_CLIENT_IP: &str = "cf-connecting-ip";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Validates an explicit identity key.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, EngagementError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() || trimmed.len() > MAX_IDENTITY_LENGTH {
            return Err(EngagementError::MissingIdentity);
        }
        Ok(Self(canonicalize(trimmed)))
    }

    /// Resolves the identity of a request.
    ///
    /// Precedence: first hop of `X-Forwarded-For`, `X-Real-IP`,
    /// `CF-Connecting-IP`, the peer address, then [`FALLBACK_IDENTITY`].
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> Result<Self, EngagementError> {
        let forwarded = header(headers, FORWARDED_FOR)
            .and_then(|chain| chain.split(',').map(str::trim).find(|hop| !hop.is_empty()));

        let candidate = forwarded
            .or_else(|| header(headers, REAL_IP))
            .or_else(|| header(headers, CDN_CLIENT_IP));

        match (candidate, peer) {
            (Some(value), _) => Self::new(value),
            (None, Some(addr)) => Self::new(addr.ip().to_string()),
            (None, None) => Self::new(FALLBACK_IDENTITY),
        }
    }

    /// Canonical key stored with the like record.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no header or peer address identified the caller.
    pub fn is_fallback(&self) -> bool {
        self.0 == FALLBACK_IDENTITY
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Normalizes address spellings so one client maps to one key: drops a port,
/// lowercases IPv6 and unwraps IPv4-mapped IPv6. Non-address values pass
/// through unchanged.
fn canonicalize(value: &str) -> String {
    let ip = value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|s| s.ip()));

    match ip {
        Some(IpAddr::V6(v6)) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
        Some(v4) => v4.to_string(),
        None => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.50:41000".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_first_hop_wins() {
        let h = headers(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.1, 10.0.0.2"),
            ("x-real-ip", "198.51.100.1"),
            ("cf-connecting-ip", "198.51.100.2"),
        ]);
        let id = ClientIdentity::resolve(&h, peer()).unwrap();
        assert_eq!(id.as_str(), "203.0.113.7");
    }

    #[test]
    fn test_precedence_falls_through_headers() {
        let h = headers(&[("x-real-ip", "198.51.100.1"), ("cf-connecting-ip", "198.51.100.2")]);
        assert_eq!(ClientIdentity::resolve(&h, peer()).unwrap().as_str(), "198.51.100.1");

        let h = headers(&[("cf-connecting-ip", "198.51.100.2")]);
        assert_eq!(ClientIdentity::resolve(&h, peer()).unwrap().as_str(), "198.51.100.2");

        let h = HeaderMap::new();
        assert_eq!(ClientIdentity::resolve(&h, peer()).unwrap().as_str(), "192.0.2.50");
    }

    #[test]
    fn test_blank_headers_are_absent() {
        let h = headers(&[("x-forwarded-for", "  , "), ("x-real-ip", "   ")]);
        let id = ClientIdentity::resolve(&h, peer()).unwrap();
        assert_eq!(id.as_str(), "192.0.2.50");
    }

    #[test]
    fn test_fallback_constant() {
        let id = ClientIdentity::resolve(&HeaderMap::new(), None).unwrap();
        assert_eq!(id.as_str(), FALLBACK_IDENTITY);
        assert!(id.is_fallback());
    }

    #[test]
    fn test_canonical_addresses() {
        assert_eq!(ClientIdentity::new("2001:DB8::1").unwrap().as_str(), "2001:db8::1");
        assert_eq!(ClientIdentity::new("::ffff:192.0.2.9").unwrap().as_str(), "192.0.2.9");
        assert_eq!(ClientIdentity::new("192.0.2.9:8080").unwrap().as_str(), "192.0.2.9");
        assert_eq!(ClientIdentity::new(" device-42 ").unwrap().as_str(), "device-42");
    }

    #[test]
    fn test_rejects_blank_and_oversized() {
        assert!(matches!(
            ClientIdentity::new("   "),
            Err(EngagementError::MissingIdentity)
        ));
        let long = "a".repeat(MAX_IDENTITY_LENGTH + 1);
        assert!(matches!(
            ClientIdentity::new(long),
            Err(EngagementError::MissingIdentity)
        ));

        let long = "b".repeat(200);
        let h = headers(&[("x-forwarded-for", long.as_str())]);
        assert!(ClientIdentity::resolve(&h, peer()).is_err());
    }
}
