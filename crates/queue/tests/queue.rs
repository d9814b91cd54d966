use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use api_types::report::ReportRequest;
use migration::MigratorTrait;
use queue::{
    ConsumerConfig, ConsumerGroup, DbQueue, Message, MessageHandler, QueueError, ReportProducer,
    partition_for,
};

const GROUP: &str = "test-group";

async fn queue_with_db(partitions: i32) -> (DbQueue, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    (DbQueue::new(db.clone(), "report", partitions), db)
}

fn test_config() -> ConsumerConfig {
    ConsumerConfig {
        group: GROUP.to_string(),
        poll_interval: Duration::from_millis(10),
        lease: Duration::from_secs(30),
        batch_size: 2,
    }
}

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<Message>>,
}

#[async_trait]
impl MessageHandler for Recorder {
    async fn handle(&self, message: &Message) {
        self.seen.lock().await.push(message.clone());
    }
}

async fn wait_for(recorder: &Recorder, count: usize) {
    for _ in 0..200 {
        if recorder.seen.lock().await.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} messages");
}

#[tokio::test]
async fn publish_keeps_key_order_within_a_partition() {
    let (queue, _db) = queue_with_db(4).await;

    let mut offsets = Vec::new();
    for n in 0..3 {
        let (partition, offset) = queue.publish("42", format!("m{n}")).await.unwrap();
        assert_eq!(partition, partition_for("42", 4));
        offsets.push(offset);
    }

    let partition = partition_for("42", 4);
    let fetched = queue.fetch(partition, 0, 10).await.unwrap();
    let payloads: Vec<_> = fetched.iter().map(|m| m.payload.as_str()).collect();
    assert_eq!(payloads, vec!["m0", "m1", "m2"]);
    assert_eq!(
        fetched.iter().map(|m| m.offset).collect::<Vec<_>>(),
        offsets
    );

    let tail = queue.fetch(partition, offsets[0], 10).await.unwrap();
    assert_eq!(tail.len(), 2);
}

#[tokio::test]
async fn fetch_rejects_unknown_partition() {
    let (queue, _db) = queue_with_db(2).await;

    let err = queue.fetch(5, 0, 10).await.unwrap_err();

    assert!(matches!(
        err,
        QueueError::InvalidPartition {
            partition: 5,
            partitions: 2
        }
    ));
}

#[tokio::test]
async fn lease_is_exclusive_until_released_or_expired() {
    let (queue, _db) = queue_with_db(1).await;
    let later = Utc::now() + chrono::Duration::seconds(30);

    assert!(queue.claim(GROUP, 0, "a", later).await.unwrap());
    assert!(queue.claim(GROUP, 0, "a", later).await.unwrap());
    assert!(!queue.claim(GROUP, 0, "b", later).await.unwrap());

    queue.release(GROUP, 0, "a").await.unwrap();
    assert!(queue.claim(GROUP, 0, "b", later).await.unwrap());

    let expired = Utc::now() - chrono::Duration::seconds(1);
    assert!(queue.claim(GROUP, 0, "b", expired).await.unwrap());
    assert!(queue.claim(GROUP, 0, "c", later).await.unwrap());
}

#[tokio::test]
async fn commit_requires_the_lease() {
    let (queue, _db) = queue_with_db(1).await;
    let later = Utc::now() + chrono::Duration::seconds(30);
    let (_, offset) = queue.publish("1", "x".to_string()).await.unwrap();

    assert!(queue.claim(GROUP, 0, "a", later).await.unwrap());
    let err = queue.commit(GROUP, 0, "b", offset).await.unwrap_err();
    assert!(matches!(err, QueueError::LeaseLost(0)));

    queue.commit(GROUP, 0, "a", offset).await.unwrap();
    // Re-committing is a no-op.
    queue.commit(GROUP, 0, "a", offset).await.unwrap();
    assert_eq!(queue.committed_offset(GROUP, 0).await.unwrap(), offset);
}

#[tokio::test]
async fn consumer_group_delivers_in_order_and_commits() {
    let (queue, _db) = queue_with_db(2).await;
    let mut last = 0;
    for n in 0..5 {
        last = queue.publish("7", format!("m{n}")).await.unwrap().1;
    }
    let partition = partition_for("7", 2);

    let recorder = Arc::new(Recorder::default());
    let shutdown = CancellationToken::new();
    let group = ConsumerGroup::spawn(
        queue.clone(),
        test_config(),
        recorder.clone(),
        shutdown.clone(),
    );
    wait_for(&recorder, 5).await;
    shutdown.cancel();
    group.join().await;

    let seen = recorder.seen.lock().await;
    let payloads: Vec<_> = seen.iter().map(|m| m.payload.as_str()).collect();
    assert_eq!(payloads, vec!["m0", "m1", "m2", "m3", "m4"]);
    assert_eq!(queue.committed_offset(GROUP, partition).await.unwrap(), last);
}

#[tokio::test]
async fn restarted_member_resumes_after_committed_offset() {
    let (queue, _db) = queue_with_db(1).await;
    queue.publish("1", "first".to_string()).await.unwrap();

    let recorder = Arc::new(Recorder::default());
    let shutdown = CancellationToken::new();
    let group = ConsumerGroup::spawn(
        queue.clone(),
        test_config(),
        recorder.clone(),
        shutdown.clone(),
    );
    wait_for(&recorder, 1).await;
    shutdown.cancel();
    group.join().await;

    queue.publish("1", "second".to_string()).await.unwrap();
    let shutdown = CancellationToken::new();
    let group = ConsumerGroup::spawn(
        queue.clone(),
        test_config(),
        recorder.clone(),
        shutdown.clone(),
    );
    wait_for(&recorder, 2).await;
    shutdown.cancel();
    group.join().await;

    let seen = recorder.seen.lock().await;
    let payloads: Vec<_> = seen.iter().map(|m| m.payload.as_str()).collect();
    assert_eq!(payloads, vec!["first", "second"]);
}

#[tokio::test]
async fn producer_publishes_report_requests_by_user() {
    let (queue, _db) = queue_with_db(4).await;
    let producer = ReportProducer::new(queue.clone());

    producer
        .enqueue(
            42,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        )
        .await
        .unwrap();

    let messages = queue.fetch(partition_for("42", 4), 0, 10).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].key, "42");
    let request: ReportRequest = serde_json::from_str(&messages[0].payload).unwrap();
    assert_eq!(request.start, "01-01-2024");
    assert_eq!(request.end, "07-01-2024");
    assert_eq!(request.user_id, 42);
}
