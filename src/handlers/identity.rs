use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// The voter key for a request, or `None` when nothing usable was found.
///
/// Keys come from network addresses, so clients behind one NAT or proxy share
/// a key and a client that controls its forwarding headers can pick its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterKey(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for VoterKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(VoterKey(resolve_voter_key(&parts.headers, peer)))
    }
}

/// First non-empty of: the first `X-Forwarded-For` entry, `X-Real-IP`, then
/// the socket peer address.
pub fn resolve_voter_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    header_value(headers, FORWARDED_FOR)
        .and_then(|raw| first_entry(&raw))
        .or_else(|| header_value(headers, REAL_IP).and_then(|raw| first_entry(&raw)))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn first_entry(raw: &str) -> Option<String> {
    raw.split(',')
        .next()
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
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

    fn peer() -> Option<SocketAddr> {
        Some("192.0.2.10:54321".parse().unwrap())
    }

    #[test]
    fn forwarded_for_takes_first_entry() {
        let h = headers(&[("x-forwarded-for", " 203.0.113.5 , 10.0.0.1"), ("x-real-ip", "10.9.9.9")]);
        assert_eq!(resolve_voter_key(&h, peer()).as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn real_ip_is_used_without_forwarded_for() {
        let h = headers(&[("x-real-ip", "198.51.100.3")]);
        assert_eq!(resolve_voter_key(&h, peer()).as_deref(), Some("198.51.100.3"));
    }

    #[test]
    fn falls_back_to_peer_address_without_port() {
        assert_eq!(
            resolve_voter_key(&HeaderMap::new(), peer()).as_deref(),
            Some("192.0.2.10")
        );
    }

    #[test]
    fn blank_forwarded_header_falls_through() {
        let h = headers(&[("x-forwarded-for", " , 10.0.0.1")]);
        assert_eq!(resolve_voter_key(&h, peer()).as_deref(), Some("192.0.2.10"));
    }

    #[test]
    fn nothing_usable_yields_none() {
        assert_eq!(resolve_voter_key(&HeaderMap::new(), None), None);
    }
}
