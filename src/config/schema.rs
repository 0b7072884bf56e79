//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::security::headers::{FASTLY_CLIENT_IP, X_FORWARDED_FOR};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// CDN trust boundary settings.
    pub cdn: CdnConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// CDN trust boundary configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CdnConfig {
    /// Enable client identity sanitization.
    pub enabled: bool,

    /// Forwarding-chain header to rewrite.
    pub forwarded_for_header: String,

    /// Headers carrying the CDN-asserted client IP, most preferred first.
    /// All of them are removed after a trusted rewrite.
    pub client_ip_headers: Vec<String>,

    /// Strip hop-by-hop headers before sanitizing.
    pub strip_hop_by_hop: bool,

    /// Trusted edge CIDR blocks (IPv4 and IPv6 mixed).
    /// `None` uses the shared built-in Fastly table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_ranges: Option<Vec<String>>,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            forwarded_for_header: X_FORWARDED_FOR.to_string(),
            client_ip_headers: vec![FASTLY_CLIENT_IP.to_string()],
            strip_hop_by_hop: true,
            trusted_ranges: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
