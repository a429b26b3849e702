//! Client address resolution from proxy headers.
//!
//! Only the first hop of `X-Forwarded-For` is trusted: the fronting reverse
//! proxy is expected to overwrite that header, so anything after the first
//! comma was supplied by the client. Candidates must parse as an IPv4 or
//! IPv6 address; malformed values are ignored rather than used as keys.

use std::fmt;
use std::net::IpAddr;

/// Header carrying the proxy chain. Only the first entry is trusted.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Single-valued fallback header set by some proxies.
pub const REAL_IP: &str = "x-real-ip";

/// Sentinel used when no valid address could be determined.
pub const UNKNOWN: &str = "unknown";

/// A resolved client address, or the shared `unknown` bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientAddress {
    Known(IpAddr),
    Unknown,
}

impl ClientAddress {
    pub fn ip(self) -> Option<IpAddr> {
        match self {
            Self::Known(ip) => Some(ip),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for ClientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(ip) => ip.fmt(f),
            Self::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl From<IpAddr> for ClientAddress {
    fn from(ip: IpAddr) -> Self {
        Self::Known(ip)
    }
}

/// Parses a single header token as an IP address.
///
/// Accepts dotted-quad IPv4 (each octet 0-255) and IPv6 forms. Ports,
/// brackets, hostnames and anything with trailing garbage are rejected.
pub fn parse_ip(candidate: &str) -> Option<IpAddr> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    candidate.parse().ok()
}

/// Resolves the client address from the raw header values.
///
/// `forwarded_for` is the `X-Forwarded-For` value, `real_ip` the
/// `X-Real-IP` value. The first valid candidate wins; if neither is valid
/// the result is [`ClientAddress::Unknown`].
pub fn resolve(forwarded_for: Option<&str>, real_ip: Option<&str>) -> ClientAddress {
    forwarded_for
        .and_then(|chain| chain.split(',').next())
        .and_then(parse_ip)
        .or_else(|| real_ip.and_then(parse_ip))
        .map_or(ClientAddress::Unknown, ClientAddress::Known)
}

/// Like [`resolve`], but falls back to the connection's peer address before
/// giving up.
pub fn resolve_with_peer(
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    peer: Option<IpAddr>,
) -> ClientAddress {
    match resolve(forwarded_for, real_ip) {
        ClientAddress::Unknown => peer.map_or(ClientAddress::Unknown, ClientAddress::Known),
        known => known,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> ClientAddress {
        ClientAddress::Known(s.parse().unwrap())
    }

    #[test]
    fn first_forwarded_hop_wins() {
        assert_eq!(
            resolve(Some("203.0.113.7, 10.0.0.1, 10.0.0.2"), Some("198.51.100.1")),
            ip("203.0.113.7")
        );
    }

    #[test]
    fn later_hops_are_never_used() {
        assert_eq!(
            resolve(Some("garbage, 10.0.0.1"), None),
            ClientAddress::Unknown
        );
    }

    #[test]
    fn falls_back_to_real_ip() {
        assert_eq!(resolve(None, Some(" 198.51.100.1 ")), ip("198.51.100.1"));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let malformed = [
            "'; DROP",
            "999.1.1.1",
            "1.2.3",
            "1.2.3.4.5",
            "256.0.0.1",
            "1.2.3.4:80",
            "localhost",
            "",
        ];
        for bad in malformed {
            assert_eq!(resolve(Some(bad), None), ClientAddress::Unknown, "{bad:?}");
        }
    }

    #[test]
    fn malformed_forwarded_falls_back_to_real_ip() {
        assert_eq!(
            resolve(Some("999.1.1.1"), Some("192.0.2.10")),
            ip("192.0.2.10")
        );
    }

    #[test]
    fn ipv6_is_accepted() {
        assert_eq!(resolve(Some("2001:db8::1"), None), ip("2001:db8::1"));
        assert_eq!(resolve(Some("[2001:db8::1]"), None), ClientAddress::Unknown);
    }

    #[test]
    fn peer_is_last_resort() {
        let peer = Some("127.0.0.1".parse().unwrap());
        assert_eq!(resolve_with_peer(Some("nope"), None, peer), ip("127.0.0.1"));
        assert_eq!(resolve_with_peer(Some("10.1.1.1"), None, peer), ip("10.1.1.1"));
        assert_eq!(resolve_with_peer(None, None, None), ClientAddress::Unknown);
    }

    #[test]
    fn unknown_displays_sentinel() {
        assert_eq!(ClientAddress::Unknown.to_string(), "unknown");
        assert_eq!(ip("::1").to_string(), "::1");
    }
}
