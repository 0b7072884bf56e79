//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the diagnostic echo handler
//! - Wire up middleware (client identity, timeout, tracing)
//! - Bind server to listener with peer address info
//! - Expose the shared policy so config reloads can swap ranges

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request},
    middleware,
    routing::any,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::http::middleware::client_identity::{client_identity_middleware, ClientIdentityState};
use crate::net::address::parse_host;
use crate::security::headers::parse_forwarded_chain;
use crate::security::{SanitizeOutcome, SkippedRange};

const DEFAULT_HTTP_PORT: u16 = 80;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: ClientIdentityState,
}

/// What the echo handler reports back about a request.
#[derive(Debug, Serialize)]
pub struct EchoResponse {
    /// Transport peer address.
    pub peer: String,
    /// Sanitizer decision, absent when sanitization is disabled.
    pub decision: Option<&'static str>,
    /// Client IP taken from the CDN claim on a trusted rewrite; absent for
    /// every other decision, even when the chain names a client.
    pub client: Option<String>,
    /// Forwarding chain after sanitization, client first.
    pub forwarded_for: Vec<String>,
    /// Destination parsed from the Host header.
    pub destination: Option<String>,
}

/// HTTP server fronted by the CDN trust boundary.
pub struct HttpServer {
    router: Router,
    identity: ClientIdentityState,
    skipped: Vec<SkippedRange>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let (identity, skipped) = ClientIdentityState::from_config(&config.cdn);
        let router = Self::build_router(&config, identity.clone());
        Self {
            router,
            identity,
            skipped,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, identity: ClientIdentityState) -> Router {
        Router::new()
            .route("/", any(echo_handler))
            .route("/{*path}", any(echo_handler))
            .layer(middleware::from_fn_with_state(
                identity.clone(),
                client_identity_middleware,
            ))
            .with_state(AppState { identity })
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// A clone of the router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Handle used to reload the trust policy while serving.
    pub fn identity(&self) -> ClientIdentityState {
        self.identity.clone()
    }

    /// Range entries skipped while building the initial policy.
    pub fn skipped_ranges(&self) -> &[SkippedRange] {
        &self.skipped
    }

    /// Run the server until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        self.run_with_shutdown(listener, shutdown_signal()).await
    }

    /// Run the server until `signal` resolves.
    pub async fn run_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Reports the sanitized view of the request.
async fn echo_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Json<EchoResponse> {
    let policy = state.identity.current();
    let outcome = request.extensions().get::<SanitizeOutcome>();

    let client = match outcome {
        Some(SanitizeOutcome::Rewritten { client_ip, .. }) => Some(client_ip.clone()),
        _ => None,
    };

    let forwarded_for = parse_forwarded_chain(request.headers(), policy.sanitizer.forwarded_for_header())
        .iter()
        .map(ToString::to_string)
        .collect();

    let destination = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .and_then(|host| parse_host(host, DEFAULT_HTTP_PORT).ok())
        .map(|dest| dest.to_string());

    Json(EchoResponse {
        peer: peer.to_string(),
        decision: outcome.map(SanitizeOutcome::decision),
        client,
        forwarded_for,
        destination,
    })
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
