//! Network address subsystem.
//!
//! # Data Flow
//! ```text
//! Connection layer peer address ("host:port" or bare host)
//!     → address.rs (split host/port, classify IP vs domain)
//!     → security (trust classification of the peer IP)
//!
//! Host header
//!     → address.rs (parse_host with default port)
//!     → Destination (diagnostics / forwarding)
//! ```
//!
//! # Design Decisions
//! - Parsing never panics; malformed input maps to `None` or `AddressError`
//! - IPv4-mapped IPv6 addresses are folded to IPv4 before classification

pub mod address;

pub use address::{parse_host, peer_ip, split_host_port, Address, AddressError, Destination};
