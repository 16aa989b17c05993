//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;

use axum::body::{to_bytes, Body};
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use photo_intake::{HttpServer, IntakeConfig, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const BOUNDARY: &str = "intake-integration-boundary";

/// One multipart part.
pub struct Part {
    pub name: &'static str,
    pub filename: Option<&'static str>,
    pub content_type: Option<&'static str>,
    pub data: Vec<u8>,
}

pub fn photo(filename: &'static str, content_type: &'static str, data: Vec<u8>) -> Part {
    Part {
        name: "photo",
        filename: Some(filename),
        content_type: Some(content_type),
        data,
    }
}

pub fn text(name: &'static str, value: &str) -> Part {
    Part {
        name,
        filename: None,
        content_type: None,
        data: value.as_bytes().to_vec(),
    }
}

/// Encode parts as a `multipart/form-data` body using [`BOUNDARY`].
pub fn encode(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(filename) = part.filename {
            disposition.push_str(&format!("; filename=\"{filename}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn upload_request(parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(encode(parts)))
        .unwrap()
}

/// Defaults, with uploads going to `dir`.
pub fn test_config(dir: &Path) -> IntakeConfig {
    let mut config = IntakeConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upload.upload_dir = dir.to_string_lossy().into_owned();
    config
}

/// Drive `server`'s router in-process as if the request came from `peer`.
pub async fn send(
    server: &HttpServer,
    peer: &str,
    request: Request<Body>,
) -> (StatusCode, HeaderMap, String) {
    let peer: SocketAddr = peer.parse().unwrap();
    let app: Router = server.router().layer(MockConnectInfo(peer));
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

/// Start the server on an ephemeral port.
pub async fn spawn_server(config: IntakeConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, config_updates) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    (addr, shutdown)
}

/// Sorted entries of the upload directory, temp files included.
pub fn stored_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

/// `<digits>_<anything>` whose whole name ends with `suffix`.
pub fn matches_stored_pattern(name: &str, suffix: &str) -> bool {
    match name.split_once('_') {
        Some((token, _)) => {
            !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) && name.ends_with(suffix)
        }
        None => false,
    }
}
