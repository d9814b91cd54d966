//! Prometheus metrics for the command path.
//!
//! Every chat message counts as one request: an in-flight gauge, a request
//! counter, a latency summary and a latency histogram labelled
//! `code="ok"|"error"`.

use std::{future::Future, time::Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

pub const IN_FLIGHT_REQUESTS: &str = "tgbot_msg_handler_in_flight_requests_total";
pub const TOTAL_REQUESTS: &str = "tgbot_msg_handler_in_total_requests_total";
pub const RESPONSE_TIME_SUMMARY: &str = "tgbot_msg_handler_summary_response_time_seconds";
pub const RESPONSE_TIME_HISTOGRAM: &str = "tgbot_msg_handler_histogram_response_time_seconds";

const QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// 100µs doubling over 16 buckets.
fn response_time_buckets() -> Vec<f64> {
    (0..16).map(|i| 0.0001 * f64::from(1u32 << i)).collect()
}

/// Exporter configured for the command metrics, not yet installed.
pub fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_quantiles(&QUANTILES)?
        .set_buckets_for_metric(
            Matcher::Full(RESPONSE_TIME_HISTOGRAM.to_string()),
            &response_time_buckets(),
        )
}

/// Install the global recorder; the handle renders the scrape body.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Time one request. `Err` carries the failure reply, which is still sent.
pub(crate) async fn observe_request<F>(request: F) -> Result<String, String>
where
    F: Future<Output = Result<String, String>>,
{
    let started = Instant::now();
    counter!(TOTAL_REQUESTS).increment(1);
    gauge!(IN_FLIGHT_REQUESTS).increment(1.0);

    let outcome = request.await;

    gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    let elapsed = started.elapsed().as_secs_f64();
    let code = if outcome.is_ok() { "ok" } else { "error" };
    histogram!(RESPONSE_TIME_HISTOGRAM, "code" => code).record(elapsed);
    histogram!(RESPONSE_TIME_SUMMARY).record(elapsed);
    outcome
}
