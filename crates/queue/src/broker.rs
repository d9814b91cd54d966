//! Topic log and consumer-group offsets stored in the shared database.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseConnection, QueryFilter, QueryOrder, QuerySelect,
    Statement, prelude::*, sea_query::OnConflict,
};

use crate::{QueueError, ResultQueue, messages, offsets, partitioner::partition_for};

/// A message read back from a partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub offset: i64,
    pub partition: i32,
    pub key: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

impl From<messages::Model> for Message {
    fn from(model: messages::Model) -> Self {
        Self {
            offset: model.id,
            partition: model.partition_id,
            key: model.message_key,
            payload: model.payload,
            created_at: model.created_at,
        }
    }
}

/// Handle on one topic. Cloning shares the pool.
#[derive(Clone, Debug)]
pub struct DbQueue {
    database: DatabaseConnection,
    topic: String,
    partitions: i32,
}

impl DbQueue {
    pub fn new(database: DatabaseConnection, topic: impl Into<String>, partitions: i32) -> Self {
        Self {
            database,
            topic: topic.into(),
            partitions: partitions.max(1),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partitions(&self) -> i32 {
        self.partitions
    }

    fn check_partition(&self, partition: i32) -> ResultQueue<()> {
        if (0..self.partitions).contains(&partition) {
            Ok(())
        } else {
            Err(QueueError::InvalidPartition {
                partition,
                partitions: self.partitions,
            })
        }
    }

    /// Append `payload` to the partition of `key`. Returns `(partition, offset)`.
    pub async fn publish(&self, key: &str, payload: String) -> ResultQueue<(i32, i64)> {
        let partition = partition_for(key, self.partitions);
        let model = messages::ActiveModel {
            topic: ActiveValue::Set(self.topic.clone()),
            partition_id: ActiveValue::Set(partition),
            message_key: ActiveValue::Set(key.to_string()),
            payload: ActiveValue::Set(payload),
            created_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.database)
        .await?;
        Ok((partition, model.id))
    }

    /// Up to `limit` messages of `partition` with offset > `after`, in order.
    pub async fn fetch(&self, partition: i32, after: i64, limit: u64) -> ResultQueue<Vec<Message>> {
        self.check_partition(partition)?;
        let models = messages::Entity::find()
            .filter(messages::Column::Topic.eq(self.topic.clone()))
            .filter(messages::Column::PartitionId.eq(partition))
            .filter(messages::Column::Id.gt(after))
            .order_by_asc(messages::Column::Id)
            .limit(limit)
            .all(&self.database)
            .await?;
        Ok(models.into_iter().map(Message::from).collect())
    }

    /// Last offset the group has finished with on `partition` (0 if none).
    pub async fn committed_offset(&self, group: &str, partition: i32) -> ResultQueue<i64> {
        self.check_partition(partition)?;
        let row = offsets::Entity::find_by_id((group.to_string(), self.topic.clone(), partition))
            .one(&self.database)
            .await?;
        Ok(row.map_or(0, |row| row.committed_offset))
    }

    /// Take or renew the lease on `partition` for `owner`. Returns `false`
    /// while another live member holds it.
    pub async fn claim(
        &self,
        group: &str,
        partition: i32,
        owner: &str,
        lease_until: DateTime<Utc>,
    ) -> ResultQueue<bool> {
        self.check_partition(partition)?;
        offsets::Entity::insert(offsets::ActiveModel {
            consumer_group: ActiveValue::Set(group.to_string()),
            topic: ActiveValue::Set(self.topic.clone()),
            partition_id: ActiveValue::Set(partition),
            committed_offset: ActiveValue::Set(0),
            owner: ActiveValue::Set(None),
            lease_until: ActiveValue::Set(None),
        })
        .on_conflict(
            OnConflict::columns([
                offsets::Column::ConsumerGroup,
                offsets::Column::Topic,
                offsets::Column::PartitionId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&self.database)
        .await?;

        let result = self
            .database
            .execute(Statement::from_sql_and_values(
                self.database.get_database_backend(),
                "UPDATE queue_offsets SET owner = ?, lease_until = ? \
                 WHERE consumer_group = ? AND topic = ? AND partition_id = ? \
                   AND (owner IS NULL OR owner = ? OR lease_until IS NULL OR lease_until < ?)",
                vec![
                    owner.into(),
                    lease_until.into(),
                    group.into(),
                    self.topic.clone().into(),
                    partition.into(),
                    owner.into(),
                    Utc::now().into(),
                ],
            ))
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record that `owner` finished every message up to `offset`.
    pub async fn commit(
        &self,
        group: &str,
        partition: i32,
        owner: &str,
        offset: i64,
    ) -> ResultQueue<()> {
        self.check_partition(partition)?;
        let result = self
            .database
            .execute(Statement::from_sql_and_values(
                self.database.get_database_backend(),
                "UPDATE queue_offsets SET committed_offset = ? \
                 WHERE consumer_group = ? AND topic = ? AND partition_id = ? AND owner = ? \
                   AND committed_offset < ?",
                vec![
                    offset.into(),
                    group.into(),
                    self.topic.clone().into(),
                    partition.into(),
                    owner.into(),
                    offset.into(),
                ],
            ))
            .await?;
        if result.rows_affected() == 0 {
            let current = self.committed_offset(group, partition).await?;
            if current < offset {
                return Err(QueueError::LeaseLost(partition));
            }
        }
        Ok(())
    }

    /// Give the lease up so another member can take over immediately.
    pub async fn release(&self, group: &str, partition: i32, owner: &str) -> ResultQueue<()> {
        self.database
            .execute(Statement::from_sql_and_values(
                self.database.get_database_backend(),
                "UPDATE queue_offsets SET owner = NULL, lease_until = NULL \
                 WHERE consumer_group = ? AND topic = ? AND partition_id = ? AND owner = ?",
                vec![
                    group.into(),
                    self.topic.clone().into(),
                    partition.into(),
                    owner.into(),
                ],
            ))
            .await?;
        Ok(())
    }
}
