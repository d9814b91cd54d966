use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use server::{METRICS_PATH, metrics_router};
use tower::ServiceExt;

#[tokio::test]
async fn scrape_renders_recorded_metrics() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let app = metrics_router(recorder.handle());
    metrics::with_local_recorder(&recorder, || {
        metrics::counter!("tgbot_msg_handler_in_total_requests_total").increment(3);
    });

    let response = app
        .oneshot(
            Request::builder()
                .uri(METRICS_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("tgbot_msg_handler_in_total_requests_total 3"));
}
