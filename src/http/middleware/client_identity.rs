//! Client identity middleware.
//! Applies the CDN trust boundary to every inbound request.

use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::config::CdnConfig;
use crate::observability::metrics;
use crate::security::headers::remove_hop_by_hop_headers;
use crate::security::{ClientIdentitySanitizer, SkippedRange};

/// One immutable generation of the trust boundary settings.
#[derive(Debug, Clone)]
pub struct ClientIdentityPolicy {
    pub sanitizer: ClientIdentitySanitizer,
    pub enabled: bool,
    pub strip_hop_by_hop: bool,
}

impl ClientIdentityPolicy {
    pub fn from_config(config: &CdnConfig) -> (Self, Vec<SkippedRange>) {
        let (sanitizer, skipped) = ClientIdentitySanitizer::from_config(config);
        (
            Self {
                sanitizer,
                enabled: config.enabled,
                strip_hop_by_hop: config.strip_hop_by_hop,
            },
            skipped,
        )
    }
}

/// Shared, swappable policy handed to the middleware.
#[derive(Debug, Clone)]
pub struct ClientIdentityState {
    policy: Arc<ArcSwap<ClientIdentityPolicy>>,
}

impl ClientIdentityState {
    pub fn new(policy: ClientIdentityPolicy) -> Self {
        Self {
            policy: Arc::new(ArcSwap::from_pointee(policy)),
        }
    }

    /// Build the policy from config, reporting skipped range entries.
    pub fn from_config(config: &CdnConfig) -> (Self, Vec<SkippedRange>) {
        let (policy, skipped) = build_policy(config);
        (Self::new(policy), skipped)
    }

    /// Snapshot of the active policy.
    pub fn current(&self) -> Arc<ClientIdentityPolicy> {
        self.policy.load_full()
    }

    /// Swap in a policy built from `config`. In-flight requests keep their snapshot.
    pub fn reload(&self, config: &CdnConfig) -> Vec<SkippedRange> {
        let (policy, skipped) = build_policy(config);
        self.policy.store(Arc::new(policy));
        tracing::info!("Trusted ranges reloaded");
        skipped
    }
}

fn build_policy(config: &CdnConfig) -> (ClientIdentityPolicy, Vec<SkippedRange>) {
    let (policy, skipped) = ClientIdentityPolicy::from_config(config);
    let ranges = policy.sanitizer.ranges();

    metrics::record_ranges_loaded(ranges, skipped.len());
    if ranges.is_empty() && policy.enabled {
        tracing::warn!("No trusted ranges loaded; every peer will be treated as untrusted");
    }
    tracing::info!(
        ipv4 = ranges.ipv4_ranges().len(),
        ipv6 = ranges.ipv6_ranges().len(),
        skipped = skipped.len(),
        enabled = policy.enabled,
        "Trusted ranges loaded"
    );

    (policy, skipped)
}

pub async fn client_identity_middleware(
    State(state): State<ClientIdentityState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let policy = state.current();

    if policy.strip_hop_by_hop {
        remove_hop_by_hop_headers(request.headers_mut());
    }

    if policy.enabled {
        let outcome = policy
            .sanitizer
            .sanitize(request.headers_mut(), &addr.to_string());

        metrics::record_sanitize(&outcome);
        tracing::debug!(
            peer = %addr,
            decision = outcome.decision(),
            "Client identity checked"
        );
        request.extensions_mut().insert(outcome);
    }

    next.run(request).await
}
