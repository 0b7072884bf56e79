//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use cdn_trust::config::ProxyConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tower::ServiceExt;

/// Default config with the trusted ranges replaced.
#[allow(dead_code)]
pub fn config_with_ranges(ranges: &[&str]) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.cdn.trusted_ranges = Some(ranges.iter().map(|r| r.to_string()).collect());
    config
}

/// Send a GET through `router` as if it arrived from `peer`, returning the echo JSON.
#[allow(dead_code)]
pub async fn echo_from(
    router: Router,
    peer: &str,
    headers: &[(&str, &str)],
) -> serde_json::Value {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut builder = Request::builder().uri("/echo");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::empty()).unwrap();

    let response = router
        .layer(MockConnectInfo(peer))
        .oneshot(request)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Issue a raw HTTP/1.1 GET over TCP and return the response body.
#[allow(dead_code)]
pub async fn raw_get(addr: SocketAddr, headers: &[(&str, &str)]) -> String {
    let mut socket = TcpStream::connect(addr).await.unwrap();

    let mut request = format!("GET /echo HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n", addr);
    for (name, value) in headers {
        request.push_str(&format!("{}: {}\r\n", name, value));
    }
    request.push_str("\r\n");
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(5), socket.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();

    response
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default()
}
