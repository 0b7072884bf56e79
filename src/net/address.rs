//! Address parsing helpers.
//!
//! # Responsibilities
//! - Split `host:port` / `[v6]:port` strings coming from the connection layer
//! - Classify a host as an IP literal or a domain name
//! - Resolve a `Host` value into a destination with a default port

use std::fmt;
use std::net::IpAddr;

use thiserror::Error;

/// Error type for host/port parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// The host part was empty.
    #[error("missing host in {0:?}")]
    MissingHost(String),
    /// The port was not a number in `0..=65535`.
    #[error("invalid port {port:?} in {raw:?}")]
    InvalidPort { raw: String, port: String },
    /// Unbalanced or misplaced brackets around an IPv6 literal.
    #[error("malformed address {0:?}")]
    Malformed(String),
}

/// Split `raw` into host and port.
///
/// Returns `None` when `raw` carries no port: a bare host, a bare IPv6
/// literal, or anything that does not follow `host:port` / `[host]:port`.
pub fn split_host_port(raw: &str) -> Option<(&str, &str)> {
    if let Some(rest) = raw.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        let port = after.strip_prefix(':')?;
        return Some((host, port));
    }

    let (host, port) = raw.rsplit_once(':')?;
    // More than one colon without brackets is a bare IPv6 literal.
    if host.contains(':') {
        return None;
    }
    Some((host, port))
}

/// Extract the peer IP text from a transport address.
///
/// `"151.101.1.1:443"` yields `"151.101.1.1"`, `"[2a04:4e40::1]:443"` yields
/// `"2a04:4e40::1"`, and anything without a port is returned verbatim.
pub fn peer_ip(raw: &str) -> &str {
    match split_host_port(raw) {
        Some((host, _)) => host,
        None => raw,
    }
}

/// Parse IP text, folding IPv4-mapped IPv6 addresses into their IPv4 form.
pub fn parse_ip(text: &str) -> Option<IpAddr> {
    text.parse::<IpAddr>().ok().map(|ip| ip.to_canonical())
}

/// A network address: either an IP literal or a domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Ip(IpAddr),
    Domain(String),
}

impl Address {
    /// Parse a host, accepting bracketed IPv6 literals.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Ok(ip) = text.parse::<IpAddr>() {
            return Address::Ip(ip);
        }
        if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            if let Ok(ip) = inner.parse::<IpAddr>() {
                return Address::Ip(ip);
            }
        }
        Address::Domain(text.to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Ip(ip) => write!(f, "{}", ip),
            Address::Domain(domain) => write!(f, "{}", domain),
        }
    }
}

/// A TCP destination parsed from a `Host` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub address: Address,
    pub port: u16,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Address::Ip(IpAddr::V6(ip)) => write!(f, "[{}]:{}", ip, self.port),
            address => write!(f, "{}:{}", address, self.port),
        }
    }
}

/// Parse `raw_host` into a destination, using `default_port` when no port is given.
pub fn parse_host(raw_host: &str, default_port: u16) -> Result<Destination, AddressError> {
    let (host, port) = match split_host_port(raw_host) {
        Some((host, port)) if port.is_empty() => (host, default_port),
        Some((host, port)) => {
            let parsed = port.parse::<u16>().map_err(|_| AddressError::InvalidPort {
                raw: raw_host.to_string(),
                port: port.to_string(),
            })?;
            (host, parsed)
        }
        None if raw_host.starts_with('[') && !raw_host.ends_with(']') => {
            return Err(AddressError::Malformed(raw_host.to_string()));
        }
        None => (raw_host, default_port),
    };

    if host.is_empty() {
        return Err(AddressError::MissingHost(raw_host.to_string()));
    }

    Ok(Destination {
        address: Address::parse(host),
        port,
    })
}
