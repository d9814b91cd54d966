use std::net::SocketAddr;

use api_types::report::{REPORT_SEND_PATH, ReportResult};
use axum::{Router, routing::post};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::report;

#[derive(Clone)]
pub struct ServerState {
    /// Bounded: a full channel blocks the handler, and with it the caller.
    pub results: mpsc::Sender<ReportResult>,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route(REPORT_SEND_PATH, post(report::send))
        .with_state(state)
}

pub async fn run(
    addr: SocketAddr,
    results: mpsc::Sender<ReportResult>,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_with_listener(listener, results, shutdown).await
}

/// Serve until `shutdown` is cancelled; in-flight calls are allowed to finish.
pub async fn run_with_listener(
    listener: tokio::net::TcpListener,
    results: mpsc::Sender<ReportResult>,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("RPC server listening on {}", addr);

    axum::serve(listener, router(ServerState { results }))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    tracing::info!("RPC server stopped");
    Ok(())
}

pub fn spawn_with_listener(
    listener: tokio::net::TcpListener,
    results: mpsc::Sender<ReportResult>,
    shutdown: CancellationToken,
) -> Result<SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(listener, results, shutdown).await {
            tracing::error!("RPC server failed: {err}");
        }
    });

    Ok(addr)
}
