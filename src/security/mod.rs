//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (strip hop-by-hop headers)
//!     → trusted_ranges.rs (is the peer a CDN edge?)
//!     → client_identity.rs (rewrite X-Forwarded-For, drop trust headers)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Trust is source-IP range membership only; no signatures or mTLS
//! - Fail closed: unknown peers are untrusted
//! - No trust in client-supplied chain entries claiming to be edges

pub mod client_identity;
pub mod headers;
pub mod trusted_ranges;

pub use client_identity::{ClientIdentitySanitizer, SanitizeOutcome};
pub use trusted_ranges::{SkippedRange, TrustedRangeSet};
