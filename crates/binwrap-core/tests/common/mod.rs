//! Mock release server for integration tests

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// How the server answers for one file name
#[derive(Clone)]
pub enum Asset {
    /// Serve the bytes with a Content-Length header
    Archive(Vec<u8>),
    /// Serve the bytes after a delay
    Slow(Vec<u8>, Duration),
    /// Send part of the body, then abort the connection
    Broken(Vec<u8>),
}

#[derive(Clone)]
struct ServerState {
    assets: Arc<HashMap<String, Asset>>,
    requests: Arc<AtomicUsize>,
}

async fn serve_asset(Path(name): Path<String>, State(state): State<ServerState>) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    log::debug!("Mock release server received request for {}", name);

    match state.assets.get(&name).cloned() {
        Some(Asset::Archive(data)) => data.into_response(),
        Some(Asset::Slow(data, delay)) => {
            tokio::time::sleep(delay).await;
            data.into_response()
        }
        Some(Asset::Broken(data)) => {
            let half = Bytes::from(data[..data.len() / 2].to_vec());
            let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
                Ok(half),
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "simulated drop")),
            ];
            Body::from_stream(futures_util::stream::iter(chunks)).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub struct MockReleaseServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    requests: Arc<AtomicUsize>,
}

impl MockReleaseServer {
    pub async fn start(assets: Vec<(&str, Asset)>) -> Self {
        let state = ServerState {
            assets: Arc::new(
                assets
                    .into_iter()
                    .map(|(name, asset)| (name.to_string(), asset))
                    .collect(),
            ),
            requests: Arc::new(AtomicUsize::new(0)),
        };
        let requests = state.requests.clone();

        let app = Router::new()
            .route("/releases/{name}", get(serve_asset))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap_or_else(|e| {
            panic!("Failed to bind mock server to 127.0.0.1:0. Error: {}", e);
        });
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| log::error!("Mock release server error: {}", e));
        });

        MockReleaseServer {
            addr,
            shutdown_tx,
            requests,
        }
    }

    pub fn url(&self, name: &str) -> String {
        format!("http://{}/releases/{}", self.addr, name)
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Build a `.tar.gz` whose members all live under a `tool-1.0/` directory
pub fn tar_gz(files: &[(&str, &str, u32)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("tool-1.0/{}", path), contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// A shell script printing `version` for any arguments
pub fn version_script(version: &str) -> String {
    format!("#!/bin/sh\necho \"tool version {}\"\n", version)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
