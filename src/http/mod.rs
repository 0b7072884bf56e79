//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (peer SocketAddr via ConnectInfo)
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → middleware/client_identity.rs (hop-by-hop strip, CDN trust boundary)
//!     → echo handler (reports the sanitized view)
//! ```

pub mod middleware;
pub mod server;

pub use middleware::{ClientIdentityPolicy, ClientIdentityState};
pub use server::{EchoResponse, HttpServer};
