//! Consumer-group member: one task per partition.
//!
//! Each task competes for the partition lease, then fetches after the
//! committed offset, hands every message to the [`MessageHandler`] and
//! commits only once the handler returned. A crash between the two redelivers
//! the message (at-least-once). The handler is awaited inline, so a slow
//! downstream stalls that partition and nothing else.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{DbQueue, Message, ResultQueue};

#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Process one message. Failures are the handler's to log; the offset is
    /// committed regardless.
    async fn handle(&self, message: &Message);
}

#[derive(Clone, Debug)]
pub struct ConsumerConfig {
    pub group: String,
    pub poll_interval: Duration,
    pub lease: Duration,
    pub batch_size: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: "report-consumer-group".to_string(),
            poll_interval: Duration::from_millis(500),
            lease: Duration::from_secs(30),
            batch_size: 16,
        }
    }
}

/// Running member of a consumer group.
#[derive(Debug)]
pub struct ConsumerGroup {
    member_id: String,
    tasks: JoinSet<()>,
}

impl ConsumerGroup {
    /// Spawn one loop per partition of `queue`. Loops stop when `shutdown`
    /// is cancelled, after finishing the message in hand.
    pub fn spawn<H: MessageHandler>(
        queue: DbQueue,
        config: ConsumerConfig,
        handler: Arc<H>,
        shutdown: CancellationToken,
    ) -> Self {
        let member_id = format!("{}-{}", config.group, uuid::Uuid::new_v4());
        let mut tasks = JoinSet::new();
        for partition in 0..queue.partitions() {
            let worker = PartitionWorker {
                queue: queue.clone(),
                config: config.clone(),
                member_id: member_id.clone(),
                partition,
            };
            tasks.spawn(worker.run(handler.clone(), shutdown.clone()));
        }
        tracing::info!(
            member_id = %member_id,
            topic = queue.topic(),
            partitions = queue.partitions(),
            "consumer group member started"
        );
        Self { member_id, tasks }
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    /// Wait for every partition loop to exit.
    pub async fn join(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(err) = result {
                tracing::error!(error = %err, "partition loop panicked");
            }
        }
    }
}

struct PartitionWorker {
    queue: DbQueue,
    config: ConsumerConfig,
    member_id: String,
    partition: i32,
}

impl PartitionWorker {
    async fn run<H: MessageHandler>(self, handler: Arc<H>, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                break;
            }
            let idle = match self.poll(handler.as_ref(), &shutdown).await {
                Ok(processed) => processed == 0,
                Err(err) => {
                    tracing::error!(partition = self.partition, error = %err, "partition poll failed");
                    true
                }
            };
            if idle {
                tokio::select! {
                    biased;
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }

        if let Err(err) = self
            .queue
            .release(&self.config.group, self.partition, &self.member_id)
            .await
        {
            tracing::warn!(partition = self.partition, error = %err, "lease release failed");
        }
        tracing::debug!(partition = self.partition, "partition loop stopped");
    }

    /// Claim, fetch one batch and process it. Returns how many messages were handled.
    async fn poll<H: MessageHandler>(
        &self,
        handler: &H,
        shutdown: &CancellationToken,
    ) -> ResultQueue<usize> {
        if !self.renew_lease().await? {
            return Ok(0);
        }

        let group = &self.config.group;
        let after = self.queue.committed_offset(group, self.partition).await?;
        let batch = self
            .queue
            .fetch(self.partition, after, self.config.batch_size)
            .await?;

        let mut processed = 0;
        for message in &batch {
            if shutdown.is_cancelled() {
                break;
            }
            tracing::debug!(
                partition = self.partition,
                offset = message.offset,
                key = %message.key,
                "delivering message"
            );
            handler.handle(message).await;
            self.queue
                .commit(group, self.partition, &self.member_id, message.offset)
                .await?;
            processed += 1;
            // The handler may have blocked for longer than the lease.
            if !self.renew_lease().await? {
                break;
            }
        }
        Ok(processed)
    }

    async fn renew_lease(&self) -> ResultQueue<bool> {
        let lease = chrono::Duration::from_std(self.config.lease)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        self.queue
            .claim(
                &self.config.group,
                self.partition,
                &self.member_id,
                Utc::now() + lease,
            )
            .await
    }
}
