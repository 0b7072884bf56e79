//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cdn_trust_requests_total` (counter): sanitizer decisions by `decision`
//! - `cdn_trust_chain_entries_dropped_total` (counter): dropped chain entries by `reason`
//! - `cdn_trust_ranges_loaded` (gauge): trusted blocks in the active set by `family`
//! - `cdn_trust_ranges_skipped_total` (counter): malformed range entries seen at load
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::security::{SanitizeOutcome, TrustedRangeSet};

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one sanitizer decision.
pub fn record_sanitize(outcome: &SanitizeOutcome) {
    counter!("cdn_trust_requests_total", "decision" => outcome.decision()).increment(1);

    if let SanitizeOutcome::Rewritten {
        spoofed, malformed, ..
    } = outcome
    {
        if *spoofed > 0 {
            counter!("cdn_trust_chain_entries_dropped_total", "reason" => "spoofed")
                .increment(*spoofed as u64);
        }
        if *malformed > 0 {
            counter!("cdn_trust_chain_entries_dropped_total", "reason" => "malformed")
                .increment(*malformed as u64);
        }
    }
}

/// Record the size of a freshly built range set.
pub fn record_ranges_loaded(ranges: &TrustedRangeSet, skipped: usize) {
    gauge!("cdn_trust_ranges_loaded", "family" => "ipv4").set(ranges.ipv4_ranges().len() as f64);
    gauge!("cdn_trust_ranges_loaded", "family" => "ipv6").set(ranges.ipv6_ranges().len() as f64);
    counter!("cdn_trust_ranges_skipped_total").increment(skipped as u64);
}
