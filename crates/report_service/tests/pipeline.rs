use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use engine::{Currency, Engine, Money};
use migration::MigratorTrait;
use queue::{ConsumerConfig, ConsumerGroup, DbQueue, ReportProducer, partition_for};
use report_service::{ReportConsumer, ReportResultSender};
use sea_orm::Database;
use server::{Notifier, NotifyError, ResultDispatcher};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(i64, String)>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user_id: i64, text: String) -> Result<(), NotifyError> {
        self.sent.lock().await.push((user_id, text));
        Ok(())
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn report_request_travels_to_the_user() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    engine
        .provision_state(
            Money::from_units(100),
            Currency::Rub,
            Utc::now() + chrono::Duration::days(30),
        )
        .await
        .unwrap();
    engine
        .record_spend(Money::from_units(12), 1, day(2024, 1, 2))
        .await
        .unwrap();
    engine
        .record_spend(Money::new(3_506_000), 2, day(2024, 1, 5))
        .await
        .unwrap();

    let shutdown = CancellationToken::new();

    // Chat side: RPC server feeding the bounded channel, drained by the dispatcher.
    let (results_tx, results_rx) = mpsc::channel(10);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = server::spawn_with_listener(listener, results_tx, shutdown.clone()).unwrap();
    let notifier = RecordingNotifier::default();
    let dispatcher = tokio::spawn(ResultDispatcher::new(notifier.clone()).run(results_rx));

    // Report side.
    let queue = DbQueue::new(db.clone(), "report", 2);
    let sender = ReportResultSender::new(reqwest::Client::new(), format!("http://{addr}"));
    let config = ConsumerConfig {
        poll_interval: Duration::from_millis(10),
        ..ConsumerConfig::default()
    };
    let group = ConsumerGroup::spawn(
        queue.clone(),
        config.clone(),
        Arc::new(ReportConsumer::new(engine.clone(), sender)),
        shutdown.clone(),
    );

    let (_, malformed) = queue.publish("1", "garbage".to_string()).await.unwrap();
    ReportProducer::new(queue.clone())
        .enqueue(1, day(2024, 1, 1), day(2024, 1, 7))
        .await
        .unwrap();

    let mut delivered = Vec::new();
    for _ in 0..300 {
        delivered = notifier.sent.lock().await.clone();
        if !delivered.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.cancel();
    group.join().await;
    dispatcher.await.unwrap();

    assert_eq!(
        delivered,
        vec![(
            1,
            "from: 01-01-2024, to: 07-01-2024\nfood - 12.00\nother - 3.51\n".to_string()
        )]
    );
    let committed = queue
        .committed_offset(&config.group, partition_for("1", 2))
        .await
        .unwrap();
    assert!(committed > malformed);
}
