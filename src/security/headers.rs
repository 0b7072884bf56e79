//! Header manipulation helpers.
//!
//! # Responsibilities
//! - Read the X-Forwarded-For chain as a list of addresses
//! - Strip hop-by-hop headers before a request moves on
//!
//! # Design Decisions
//! - Multiple header lines of the same name are combined in order
//! - Values that are not valid visible ASCII are ignored, not rejected

use axum::http::header::{self, HeaderMap, HeaderName};

use crate::net::address::Address;

/// Default forwarding-chain header.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Default CDN trust header carrying the real client IP.
pub const FASTLY_CLIENT_IP: &str = "fastly-client-ip";

/// Headers that are always hop-by-hop.
const HOP_BY_HOP: &[&str] = &[
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Iterate over the comma-separated tokens of every `name` header line, trimmed.
pub fn header_tokens<'a>(
    headers: &'a HeaderMap,
    name: &HeaderName,
) -> impl Iterator<Item = &'a str> + 'a {
    headers
        .get_all(name)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
}

/// Parse the X-Forwarded-For header into addresses, client first.
///
/// Returns an empty list when the header is absent.
pub fn parse_x_forwarded_for(headers: &HeaderMap) -> Vec<Address> {
    parse_forwarded_chain(headers, &HeaderName::from_static(X_FORWARDED_FOR))
}

/// Parse a forwarding-chain header with a custom name.
pub fn parse_forwarded_chain(headers: &HeaderMap, name: &HeaderName) -> Vec<Address> {
    header_tokens(headers, name)
        .filter(|token| !token.is_empty())
        .map(Address::parse)
        .collect()
}

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn remove_hop_by_hop_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }

    let listed: Vec<HeaderName> = header_tokens(headers, &header::CONNECTION)
        .filter_map(|token| HeaderName::from_bytes(token.as_bytes()).ok())
        .collect();
    headers.remove(header::CONNECTION);

    for name in listed {
        headers.remove(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parse_forwarded_for_in_order() {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_FORWARDED_FOR,
            HeaderValue::from_static("129.78.138.66, 129.78.64.103"),
        );
        let addrs = parse_x_forwarded_for(&headers);
        assert_eq!(
            addrs,
            vec![
                Address::parse("129.78.138.66"),
                Address::parse("129.78.64.103")
            ]
        );
    }

    #[test]
    fn parse_forwarded_for_combines_lines() {
        let mut headers = HeaderMap::new();
        headers.append(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));
        headers.append(X_FORWARDED_FOR, HeaderValue::from_static("proxy.internal, ,10.0.0.2"));
        let addrs = parse_x_forwarded_for(&headers);
        assert_eq!(addrs.len(), 3);
        assert_eq!(addrs[1], Address::Domain("proxy.internal".into()));
    }

    #[test]
    fn parse_forwarded_for_absent() {
        assert!(parse_x_forwarded_for(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn hop_by_hop_headers_removed() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("golang.org"));
        headers.insert("connection", HeaderValue::from_static("keep-alive,Foo, Bar"));
        headers.insert("foo", HeaderValue::from_static("foo"));
        headers.insert("bar", HeaderValue::from_static("bar"));
        headers.insert("proxy-connection", HeaderValue::from_static("keep-alive"));
        headers.insert("proxy-authenticate", HeaderValue::from_static("abc"));
        headers.insert("accept-encoding", HeaderValue::from_static("gzip"));
        headers.insert("cache-control", HeaderValue::from_static("no-cache"));

        remove_hop_by_hop_headers(&mut headers);

        for name in ["connection", "foo", "bar", "proxy-connection", "proxy-authenticate"] {
            assert!(headers.get(name).is_none(), "{name} should be removed");
        }
        assert_eq!(headers.get("host").unwrap(), "golang.org");
        assert_eq!(headers.get("accept-encoding").unwrap(), "gzip");
        assert_eq!(headers.get("cache-control").unwrap(), "no-cache");
    }

    #[test]
    fn hop_by_hop_without_connection_header() {
        let mut headers = HeaderMap::new();
        headers.insert("upgrade", HeaderValue::from_static("websocket"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));
        remove_hop_by_hop_headers(&mut headers);
        assert!(headers.get("upgrade").is_none());
        assert!(headers.get("x-forwarded-for").is_some());
    }
}
