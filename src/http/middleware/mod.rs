pub mod client_identity;

pub use client_identity::{client_identity_middleware, ClientIdentityPolicy, ClientIdentityState};
