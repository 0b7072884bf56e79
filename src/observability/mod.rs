//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sanitizer and config reloads produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (decision counters, range gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
