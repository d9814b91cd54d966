use std::sync::Arc;

use api_types::report::ReportResult;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use engine::{Currency, Engine, Money};
use migration::MigratorTrait;
use queue::{Message, MessageHandler};
use report_service::{ReportConsumer, ResultSink, RpcError};
use sea_orm::Database;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct RecordingSink {
    sent: Arc<Mutex<Vec<ReportResult>>>,
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn send(&self, result: &ReportResult) -> Result<(), RpcError> {
        self.sent.lock().await.push(result.clone());
        Ok(())
    }
}

async fn engine(provisioned: bool) -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    if provisioned {
        engine
            .provision_state(
                Money::from_units(100),
                Currency::Rub,
                Utc::now() + chrono::Duration::days(30),
            )
            .await
            .unwrap();
    }
    engine
}

fn message(payload: &str) -> Message {
    Message {
        offset: 1,
        partition: 0,
        key: "1".to_string(),
        payload: payload.to_string(),
        created_at: Utc::now(),
    }
}

const WEEK: &str = r#"{"userId":1,"start":"01-01-2024","end":"07-01-2024"}"#;

#[tokio::test]
async fn empty_range_delivers_an_empty_report() {
    let sink = RecordingSink::default();
    let consumer = ReportConsumer::new(engine(true).await, sink.clone());

    consumer.handle(&message(WEEK)).await;

    let sent = sink.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].user_id, 1);
    assert_eq!(sent[0].start, "01-01-2024");
    assert!(sent[0].data.is_empty());
}

#[tokio::test]
async fn malformed_payload_is_dropped() {
    let sink = RecordingSink::default();
    let consumer = ReportConsumer::new(engine(true).await, sink.clone());

    consumer.handle(&message("{not json")).await;
    consumer
        .handle(&message(r#"{"userId":1,"start":"2024-01-01","end":"07-01-2024"}"#))
        .await;

    assert!(sink.sent.lock().await.is_empty());
}

#[tokio::test]
async fn aggregation_failure_is_dropped() {
    let sink = RecordingSink::default();
    // No budget state: the report cannot be converted.
    let consumer = ReportConsumer::new(engine(false).await, sink.clone());

    consumer.handle(&message(WEEK)).await;

    assert!(sink.sent.lock().await.is_empty());
}

#[tokio::test]
async fn redelivered_request_yields_identical_data() {
    let engine = engine(true).await;
    engine
        .record_spend(
            Money::new(1_234_567),
            1,
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        )
        .await
        .unwrap();
    let sink = RecordingSink::default();
    let consumer = ReportConsumer::new(engine, sink.clone());

    consumer.handle(&message(WEEK)).await;
    consumer.handle(&message(WEEK)).await;

    let sent = sink.sent.lock().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert_eq!(sent[0].data.get("food"), Some(&1.234567));
}
