//! CDN trust boundary for reverse proxies.
//!
//! Classifies peers against trusted CDN edge ranges and rewrites the
//! forwarding chain from the CDN's client IP claim.

pub mod config;
pub mod http;
pub mod net;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use security::{ClientIdentitySanitizer, SanitizeOutcome, TrustedRangeSet};
