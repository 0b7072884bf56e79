//! Trusted CDN edge ranges.
//!
//! # Responsibilities
//! - Hold the immutable allowlist of CDN edge CIDR blocks (IPv4 and IPv6)
//! - Classify peer and chain addresses against it
//! - Report malformed entries without failing the build
//!
//! # Design Decisions
//! - Closed world: anything unparseable or unmatched is untrusted
//! - Malformed entries are skipped and reported, never fatal
//! - The built-in table is built once per process on first use

use std::net::IpAddr;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use thiserror::Error;

use crate::net::address::parse_ip;

/// Published Fastly edge ranges (IPv4).
pub const FASTLY_IPV4_RANGES: &[&str] = &[
    "23.235.32.0/20",
    "43.249.72.0/22",
    "103.244.50.0/24",
    "103.245.222.0/23",
    "103.245.224.0/24",
    "104.156.80.0/20",
    "140.248.64.0/18",
    "140.248.128.0/17",
    "146.75.0.0/17",
    "146.75.128.0/17",
    "151.101.0.0/16",
    "157.52.64.0/18",
    "157.52.128.0/17",
    "167.82.0.0/17",
    "167.82.128.0/20",
    "167.82.160.0/20",
    "167.82.224.0/20",
    "172.111.64.0/18",
    "172.111.128.0/17",
    "185.31.16.0/22",
    "199.27.72.0/21",
    "199.232.0.0/16",
];

/// Published Fastly edge ranges (IPv6).
pub const FASTLY_IPV6_RANGES: &[&str] = &["2a04:4e40::/32", "2a04:4e42::/32", "2a04:4e46::/32"];

static BUILTIN: OnceLock<Arc<TrustedRangeSet>> = OnceLock::new();

/// A range entry that could not be parsed and was left out of the set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid CIDR block {entry:?}: {source}")]
pub struct SkippedRange {
    /// The raw entry as it appeared in the source list.
    pub entry: String,
    #[source]
    pub source: ipnet::AddrParseError,
}

/// Immutable set of trusted CDN edge blocks, split by address family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedRangeSet {
    v4: Vec<Ipv4Net>,
    v6: Vec<Ipv6Net>,
}

impl TrustedRangeSet {
    /// Build a set from CIDR text. Bare addresses are taken as single-host blocks.
    ///
    /// Entries that fail to parse are logged and returned alongside the set.
    pub fn from_cidrs<I, S>(entries: I) -> (Self, Vec<SkippedRange>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::default();
        let mut skipped = Vec::new();

        for entry in entries {
            let entry = entry.as_ref().trim();
            match parse_block(entry) {
                Ok(IpNet::V4(net)) => set.v4.push(net.trunc()),
                Ok(IpNet::V6(net)) => set.v6.push(net.trunc()),
                Err(source) => {
                    tracing::warn!(entry = %entry, error = %source, "Skipping malformed trusted range");
                    skipped.push(SkippedRange {
                        entry: entry.to_string(),
                        source,
                    });
                }
            }
        }

        (set, skipped)
    }

    /// The compiled-in Fastly table, built on first call and shared afterwards.
    pub fn builtin() -> Arc<TrustedRangeSet> {
        let set = BUILTIN.get_or_init(|| {
            let (set, _) = Self::from_cidrs(FASTLY_IPV4_RANGES.iter().chain(FASTLY_IPV6_RANGES));
            tracing::debug!(
                ipv4 = set.v4.len(),
                ipv6 = set.v6.len(),
                "Built-in trusted ranges initialized"
            );
            Arc::new(set)
        });
        Arc::clone(set)
    }

    /// Check whether `ip` falls inside any trusted block.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match ip.to_canonical() {
            IpAddr::V4(ip) => self.v4.iter().any(|net| net.contains(&ip)),
            IpAddr::V6(ip) => self.v6.iter().any(|net| net.contains(&ip)),
        }
    }

    /// Check whether `ip_text` is an IP address inside a trusted block.
    ///
    /// Unparseable input is untrusted.
    pub fn is_trusted(&self, ip_text: &str) -> bool {
        parse_ip(ip_text).is_some_and(|ip| self.contains(ip))
    }

    pub fn ipv4_ranges(&self) -> &[Ipv4Net] {
        &self.v4
    }

    pub fn ipv6_ranges(&self) -> &[Ipv6Net] {
        &self.v6
    }

    pub fn len(&self) -> usize {
        self.v4.len() + self.v6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }
}

fn parse_block(entry: &str) -> Result<IpNet, ipnet::AddrParseError> {
    match IpNet::from_str(entry) {
        Ok(net) => Ok(net),
        Err(err) => entry.parse::<IpAddr>().map(IpNet::from).map_err(|_| err),
    }
}
