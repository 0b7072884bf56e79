//! CDN trust boundary service.
//!
//! Accepts connections, decides whether each peer is a trusted CDN edge, and
//! rewrites `X-Forwarded-For` from the CDN's client IP claim when it is.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ CDN edge ──▶ ┌──────────────────────────────────────────────┐
//!                             │  listener (ConnectInfo<SocketAddr>)          │
//!                             │      │                                       │
//!                             │      ▼                                       │
//!                             │  client_identity middleware                  │
//!                             │   ├─ strip hop-by-hop headers                │
//!                             │   ├─ TrustedRangeSet: peer in edge ranges?   │
//!                             │   └─ ClientIdentitySanitizer: rewrite chain  │
//!                             │      │                                       │
//!                             │      ▼                                       │
//!                             │  echo handler (sanitized view as JSON)       │
//!                             │                                              │
//!                             │  config watcher ──▶ ArcSwap policy reload    │
//!                             └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use cdn_trust::config::{load_config, ConfigWatcher, ProxyConfig};
use cdn_trust::http::HttpServer;
use cdn_trust::observability::{logging, metrics};
use cdn_trust::security::ClientIdentitySanitizer;

#[derive(Parser)]
#[command(name = "cdn-trust")]
#[command(about = "CDN trust boundary for client identity headers", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Load the configuration, report skipped trusted ranges, and exit.
    #[arg(long)]
    check: bool,

    /// Reload trusted ranges when the configuration file changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("cdn-trust v{} starting", env!("CARGO_PKG_VERSION"));

    if cli.check {
        let (sanitizer, skipped) = ClientIdentitySanitizer::from_config(&config.cdn);
        for entry in &skipped {
            tracing::error!(entry = %entry.entry, error = %entry.source, "Invalid trusted range");
        }
        tracing::info!(
            loaded = sanitizer.ranges().len(),
            skipped = skipped.len(),
            "Configuration check complete"
        );
        return Ok(if skipped.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        cdn_enabled = config.cdn.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(config);

    // Keep the watcher alive for the lifetime of the server.
    let _watcher = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let identity = server.identity();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    identity.reload(&new_config.cdn);
                }
            });
            Some(watcher.run()?)
        }
        _ => None,
    };

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(ExitCode::SUCCESS)
}
