//! Prometheus scrape endpoint, served on its own listener.

use axum::{Router, extract::State, routing::get};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;

pub const METRICS_PATH: &str = "/metrics";

pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route(METRICS_PATH, get(render))
        .with_state(handle)
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

pub async fn run_metrics(
    listener: tokio::net::TcpListener,
    handle: PrometheusHandle,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    tracing::info!("metrics listening on {}", listener.local_addr()?);

    axum::serve(listener, metrics_router(handle))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
