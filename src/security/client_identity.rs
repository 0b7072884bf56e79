//! Client identity sanitization at the CDN trust boundary.
//!
//! # Responsibilities
//! - Gate header rewriting on the peer being a trusted CDN edge
//! - Append the CDN-asserted client IP to the forwarding chain
//! - Drop chain entries that are malformed or claim to be CDN edges
//! - Remove the consumed trust headers so later hops cannot replay them
//!
//! # Design Decisions
//! - Source-IP range membership is the only authorization check
//! - Nothing is ever rewritten on behalf of an untrusted peer
//! - Every failure degrades to a no-op; callers never see an error

use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::CdnConfig;
use crate::net::address::{parse_ip, peer_ip};
use crate::security::headers::{FASTLY_CLIENT_IP, X_FORWARDED_FOR};
use crate::security::trusted_ranges::{SkippedRange, TrustedRangeSet};

/// What a single sanitization pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeOutcome {
    /// Peer is not a trusted edge; headers untouched.
    UntrustedPassthrough,
    /// Peer is trusted but asserted no usable client IP; headers untouched.
    NoClaim,
    /// Chain rewritten with the asserted client IP last.
    Rewritten {
        client_ip: String,
        /// Chain entries dropped for sitting inside the trusted ranges.
        spoofed: usize,
        /// Chain entries dropped for not being IP addresses.
        malformed: usize,
    },
}

impl SanitizeOutcome {
    /// Label used for logs and metrics.
    pub fn decision(&self) -> &'static str {
        match self {
            SanitizeOutcome::UntrustedPassthrough => "untrusted_passthrough",
            SanitizeOutcome::NoClaim => "no_claim",
            SanitizeOutcome::Rewritten { .. } => "trusted_rewrite",
        }
    }
}

/// Rewrites the forwarding chain for requests arriving through a trusted CDN edge.
#[derive(Debug, Clone)]
pub struct ClientIdentitySanitizer {
    ranges: Arc<TrustedRangeSet>,
    forwarded_for: HeaderName,
    trust_headers: Vec<HeaderName>,
}

impl ClientIdentitySanitizer {
    /// Sanitizer using `X-Forwarded-For` and `Fastly-Client-IP`.
    pub fn new(ranges: Arc<TrustedRangeSet>) -> Self {
        Self::with_headers(
            ranges,
            HeaderName::from_static(X_FORWARDED_FOR),
            vec![HeaderName::from_static(FASTLY_CLIENT_IP)],
        )
    }

    /// Sanitizer with explicit header names.
    ///
    /// `trust_headers` are consulted in order; the first non-empty one is the claim.
    pub fn with_headers(
        ranges: Arc<TrustedRangeSet>,
        forwarded_for: HeaderName,
        trust_headers: Vec<HeaderName>,
    ) -> Self {
        Self {
            ranges,
            forwarded_for,
            trust_headers,
        }
    }

    /// Build the range set and sanitizer from configuration.
    ///
    /// Without configured ranges the shared built-in table is used. Header
    /// names are expected to have passed validation; invalid ones are logged
    /// and ignored.
    pub fn from_config(config: &CdnConfig) -> (Self, Vec<SkippedRange>) {
        let (ranges, skipped) = match &config.trusted_ranges {
            Some(entries) => {
                let (set, skipped) = TrustedRangeSet::from_cidrs(entries);
                (Arc::new(set), skipped)
            }
            None => (TrustedRangeSet::builtin(), Vec::new()),
        };

        let forwarded_for = match HeaderName::from_bytes(config.forwarded_for_header.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(
                    header = %config.forwarded_for_header,
                    "Invalid forwarding chain header name, using x-forwarded-for"
                );
                HeaderName::from_static(X_FORWARDED_FOR)
            }
        };

        let trust_headers: Vec<HeaderName> = config
            .client_ip_headers
            .iter()
            .filter_map(|name| match HeaderName::from_bytes(name.as_bytes()) {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    tracing::warn!(header = %name, "Ignoring invalid client IP header name");
                    None
                }
            })
            .collect();
        if trust_headers.is_empty() {
            tracing::warn!("No usable client IP headers; trusted requests will carry no claim");
        }

        (
            Self::with_headers(ranges, forwarded_for, trust_headers),
            skipped,
        )
    }

    pub fn ranges(&self) -> &TrustedRangeSet {
        &self.ranges
    }

    pub fn forwarded_for_header(&self) -> &HeaderName {
        &self.forwarded_for
    }

    pub fn trust_headers(&self) -> &[HeaderName] {
        &self.trust_headers
    }

    /// Sanitize `headers` for a request received from `peer_addr`.
    pub fn sanitize(&self, headers: &mut HeaderMap, peer_addr: &str) -> SanitizeOutcome {
        let peer = peer_ip(peer_addr);
        if !self.ranges.is_trusted(peer) {
            return SanitizeOutcome::UntrustedPassthrough;
        }

        let Some(client_ip) = self.asserted_client_ip(headers) else {
            return SanitizeOutcome::NoClaim;
        };

        let mut spoofed = 0;
        let mut malformed = 0;
        let mut chain: Vec<&str> = Vec::new();
        for line in headers.get_all(&self.forwarded_for) {
            // Lines with non-visible-ASCII bytes cannot hold IP literals.
            let Ok(line) = line.to_str() else {
                malformed += 1;
                continue;
            };
            for token in line.split(',').map(str::trim) {
                if token.is_empty() {
                    continue;
                }
                match parse_ip(token) {
                    None => malformed += 1,
                    Some(ip) if self.ranges.contains(ip) => spoofed += 1,
                    Some(_) => chain.push(token),
                }
            }
        }

        if !chain.contains(&client_ip.as_str()) {
            chain.push(&client_ip);
        }

        // Tokens come from valid header values and the claim is an IP literal.
        let Ok(value) = HeaderValue::from_str(&chain.join(", ")) else {
            tracing::warn!(peer = %peer, "Rewritten forwarding chain is not a valid header value");
            return SanitizeOutcome::NoClaim;
        };

        headers.insert(self.forwarded_for.clone(), value);
        for name in &self.trust_headers {
            headers.remove(name);
        }

        SanitizeOutcome::Rewritten {
            client_ip,
            spoofed,
            malformed,
        }
    }

    fn asserted_client_ip(&self, headers: &HeaderMap) -> Option<String> {
        let (name, claim) = self.trust_headers.iter().find_map(|name| {
            let value = headers.get(name)?.to_str().ok()?.trim();
            (!value.is_empty()).then_some((name, value))
        })?;

        if parse_ip(claim).is_none() {
            tracing::debug!(header = %name, value = %claim, "Ignoring non-IP client claim");
            return None;
        }
        Some(claim.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XFF: &str = "x-forwarded-for";
    const CLAIM: &str = "fastly-client-ip";

    fn sanitizer() -> ClientIdentitySanitizer {
        ClientIdentitySanitizer::new(TrustedRangeSet::builtin())
    }

    fn request_headers(claim: Option<&str>, xff: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(claim) = claim {
            headers.insert(CLAIM, HeaderValue::from_str(claim).unwrap());
        }
        if let Some(xff) = xff {
            headers.insert(XFF, HeaderValue::from_str(xff).unwrap());
        }
        headers
    }

    fn xff(headers: &HeaderMap) -> Option<&str> {
        headers.get(XFF).map(|v| v.to_str().unwrap())
    }

    #[test]
    fn trusted_peer_empty_chain() {
        let mut headers = request_headers(Some("192.168.1.1"), None);
        let outcome = sanitizer().sanitize(&mut headers, "151.101.1.1");
        assert_eq!(xff(&headers), Some("192.168.1.1"));
        assert_eq!(outcome.decision(), "trusted_rewrite");
    }

    #[test]
    fn trusted_peer_appends_to_chain() {
        let mut headers = request_headers(Some("192.168.1.1"), Some("10.0.0.1"));
        sanitizer().sanitize(&mut headers, "151.101.1.1");
        assert_eq!(xff(&headers), Some("10.0.0.1, 192.168.1.1"));
    }

    #[test]
    fn trusted_peer_does_not_duplicate_claim() {
        let mut headers = request_headers(Some("192.168.1.1"), Some("10.0.0.1, 192.168.1.1"));
        sanitizer().sanitize(&mut headers, "151.101.1.1");
        assert_eq!(xff(&headers), Some("10.0.0.1, 192.168.1.1"));
    }

    #[test]
    fn untrusted_peer_passes_through() {
        let mut headers = request_headers(Some("192.168.1.1"), Some("10.0.0.1, 151.101.5.5"));
        let before = headers.clone();
        let outcome = sanitizer().sanitize(&mut headers, "192.168.1.1");
        assert_eq!(outcome, SanitizeOutcome::UntrustedPassthrough);
        assert_eq!(headers, before);
    }

    #[test]
    fn unparseable_peer_passes_through() {
        let mut headers = request_headers(Some("192.168.1.1"), Some("10.0.0.1"));
        let before = headers.clone();
        assert_eq!(
            sanitizer().sanitize(&mut headers, "not-a-peer:port"),
            SanitizeOutcome::UntrustedPassthrough
        );
        assert_eq!(headers, before);
    }

    #[test]
    fn trusted_ipv6_peer() {
        let mut headers = request_headers(Some("192.168.1.1"), None);
        sanitizer().sanitize(&mut headers, "2a04:4e40::1");
        assert_eq!(xff(&headers), Some("192.168.1.1"));
    }

    #[test]
    fn peer_with_port() {
        let mut headers = request_headers(Some("192.168.1.1"), None);
        sanitizer().sanitize(&mut headers, "151.101.1.1:51234");
        assert_eq!(xff(&headers), Some("192.168.1.1"));

        let mut headers = request_headers(Some("192.168.1.1"), None);
        sanitizer().sanitize(&mut headers, "[2a04:4e42::9]:443");
        assert_eq!(xff(&headers), Some("192.168.1.1"));
    }

    #[test]
    fn missing_claim_is_noop() {
        let mut headers = request_headers(None, Some("10.0.0.1"));
        let before = headers.clone();
        assert_eq!(
            sanitizer().sanitize(&mut headers, "151.101.1.1"),
            SanitizeOutcome::NoClaim
        );
        assert_eq!(headers, before);
    }

    #[test]
    fn blank_or_invalid_claim_is_noop() {
        for claim in ["   ", "client.example.com"] {
            let mut headers = request_headers(Some(claim), Some("10.0.0.1"));
            let before = headers.clone();
            assert_eq!(
                sanitizer().sanitize(&mut headers, "151.101.1.1"),
                SanitizeOutcome::NoClaim
            );
            assert_eq!(headers, before);
        }
    }

    #[test]
    fn spoofed_edge_entries_are_dropped() {
        let mut headers =
            request_headers(Some("192.168.1.1"), Some("151.101.5.5, 10.0.0.1, 2a04:4e46::7"));
        let outcome = sanitizer().sanitize(&mut headers, "151.101.1.1");
        assert_eq!(xff(&headers), Some("10.0.0.1, 192.168.1.1"));
        assert_eq!(
            outcome,
            SanitizeOutcome::Rewritten {
                client_ip: "192.168.1.1".into(),
                spoofed: 2,
                malformed: 0,
            }
        );
    }

    #[test]
    fn malformed_and_empty_entries_are_dropped() {
        let mut headers =
            request_headers(Some("192.168.1.1"), Some(" , unknown,10.0.0.1 ,,evil.example"));
        let outcome = sanitizer().sanitize(&mut headers, "151.101.1.1");
        assert_eq!(xff(&headers), Some("10.0.0.1, 192.168.1.1"));
        assert!(matches!(outcome, SanitizeOutcome::Rewritten { malformed: 2, .. }));
    }

    #[test]
    fn chain_of_only_spoofed_entries_becomes_claim() {
        let mut headers = request_headers(Some("203.0.113.9"), Some("151.101.5.5"));
        sanitizer().sanitize(&mut headers, "151.101.1.1");
        assert_eq!(xff(&headers), Some("203.0.113.9"));
    }

    #[test]
    fn multiple_chain_lines_are_combined() {
        let mut headers = request_headers(Some("192.168.1.1"), None);
        headers.append(XFF, HeaderValue::from_static("10.0.0.1"));
        headers.append(XFF, HeaderValue::from_static("10.0.0.2"));
        sanitizer().sanitize(&mut headers, "151.101.1.1");
        assert_eq!(headers.get_all(XFF).iter().count(), 1);
        assert_eq!(xff(&headers), Some("10.0.0.1, 10.0.0.2, 192.168.1.1"));
    }

    #[test]
    fn trust_header_removed_after_rewrite() {
        let mut headers = request_headers(Some("192.168.1.1"), None);
        sanitizer().sanitize(&mut headers, "151.101.1.1");
        assert!(headers.get(CLAIM).is_none());
    }

    #[test]
    fn second_pass_is_idempotent() {
        let s = sanitizer();
        let mut headers = request_headers(Some("192.168.1.1"), Some("151.101.5.5, 10.0.0.1"));
        s.sanitize(&mut headers, "151.101.1.1");
        let once = xff(&headers).map(str::to_string);
        assert_eq!(s.sanitize(&mut headers, "151.101.1.1"), SanitizeOutcome::NoClaim);
        assert_eq!(xff(&headers).map(str::to_string), once);
    }

    #[test]
    fn trust_headers_consulted_in_order() {
        let s = ClientIdentitySanitizer::with_headers(
            TrustedRangeSet::builtin(),
            HeaderName::from_static(XFF),
            vec![
                HeaderName::from_static("fastly-client-ip"),
                HeaderName::from_static("true-client-ip"),
            ],
        );

        let mut headers = HeaderMap::new();
        headers.insert("true-client-ip", HeaderValue::from_static("198.51.100.4"));
        s.sanitize(&mut headers, "151.101.1.1");
        assert_eq!(xff(&headers), Some("198.51.100.4"));
        assert!(headers.get("true-client-ip").is_none());

        let mut headers = HeaderMap::new();
        headers.insert("fastly-client-ip", HeaderValue::from_static("198.51.100.5"));
        headers.insert("true-client-ip", HeaderValue::from_static("198.51.100.4"));
        s.sanitize(&mut headers, "151.101.1.1");
        assert_eq!(xff(&headers), Some("198.51.100.5"));
        assert!(headers.get("fastly-client-ip").is_none());
        assert!(headers.get("true-client-ip").is_none());
    }

    #[test]
    fn from_config_reports_skipped_ranges() {
        let config = CdnConfig {
            trusted_ranges: Some(vec!["151.101.0.0/16".into(), "nonsense".into()]),
            ..CdnConfig::default()
        };
        let (s, skipped) = ClientIdentitySanitizer::from_config(&config);
        assert_eq!(skipped.len(), 1);
        assert_eq!(s.ranges().len(), 1);
        assert_eq!(s.forwarded_for_header().as_str(), XFF);
        assert_eq!(s.trust_headers().len(), 1);
    }

    #[test]
    fn default_config_shares_builtin_table() {
        let (first, skipped) = ClientIdentitySanitizer::from_config(&CdnConfig::default());
        let (second, _) = ClientIdentitySanitizer::from_config(&CdnConfig::default());
        assert!(skipped.is_empty());
        assert!(std::ptr::eq(first.ranges(), &*TrustedRangeSet::builtin()));
        assert!(std::ptr::eq(first.ranges(), second.ranges()));
    }

    #[test]
    fn invalid_header_names_are_dropped() {
        let config = CdnConfig {
            forwarded_for_header: "bad header".into(),
            client_ip_headers: vec!["bad header".into(), "x-real-ip".into()],
            ..CdnConfig::default()
        };
        let (s, _) = ClientIdentitySanitizer::from_config(&config);
        assert_eq!(s.forwarded_for_header().as_str(), XFF);
        let names: Vec<_> = s.trust_headers().iter().map(HeaderName::as_str).collect();
        assert_eq!(names, vec!["x-real-ip"]);
    }

    #[test]
    fn non_text_chain_line_counts_as_malformed() {
        let mut headers = request_headers(Some("192.168.1.1"), None);
        headers.append(XFF, HeaderValue::from_bytes(b"10.0.0.1\xff\xfe").unwrap());
        headers.append(XFF, HeaderValue::from_static("10.0.0.2"));
        let outcome = sanitizer().sanitize(&mut headers, "151.101.1.1");
        assert_eq!(xff(&headers), Some("10.0.0.2, 192.168.1.1"));
        assert_eq!(
            outcome,
            SanitizeOutcome::Rewritten {
                client_ip: "192.168.1.1".into(),
                spoofed: 0,
                malformed: 1,
            }
        );
    }
}
