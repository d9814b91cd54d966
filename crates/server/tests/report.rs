use std::time::Duration;

use api_types::report::{REPORT_SEND_PATH, ReportResult};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use server::{ServerState, router};
use tokio::sync::mpsc;
use tower::ServiceExt;

fn send_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(REPORT_SEND_PATH)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn result_json(user_id: i64) -> serde_json::Value {
    serde_json::json!({
        "userId": user_id,
        "start": "01-01-2024",
        "end": "07-01-2024",
        "data": {"food": 12.5}
    })
}

#[tokio::test]
async fn accepted_result_lands_on_the_channel() {
    let (tx, mut rx) = mpsc::channel(10);
    let app = router(ServerState { results: tx });

    let response = app.oneshot(send_request(result_json(7))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"{}");

    let received: ReportResult = rx.recv().await.unwrap();
    assert_eq!(received.user_id, 7);
    assert_eq!(received.data.get("food"), Some(&12.5));
}

#[tokio::test]
async fn invalid_dates_are_rejected() {
    let (tx, mut rx) = mpsc::channel(10);
    let app = router(ServerState { results: tx });

    let response = app
        .oneshot(send_request(serde_json::json!({
            "userId": 7,
            "start": "2024-01-01",
            "end": "07-01-2024",
            "data": {}
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn closed_channel_is_service_unavailable() {
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let app = router(ServerState { results: tx });

    let response = app.oneshot(send_request(result_json(7))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn full_channel_blocks_the_call_until_drained() {
    let (tx, mut rx) = mpsc::channel(1);
    let app = router(ServerState { results: tx });

    let first = app
        .clone()
        .oneshot(send_request(result_json(1)))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let mut pending = tokio::spawn(app.oneshot(send_request(result_json(2))));
    assert!(
        tokio::time::timeout(Duration::from_millis(100), &mut pending)
            .await
            .is_err(),
        "call should wait while the channel is full"
    );

    assert_eq!(rx.recv().await.unwrap().user_id, 1);
    let second = pending.await.unwrap().unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(rx.recv().await.unwrap().user_id, 2);
}
