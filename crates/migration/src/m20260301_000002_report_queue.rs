//! Durable report queue.
//!
//! - `queue_messages`: append-only log; `id` is the message offset. It is
//!   monotonic across the whole table, so ordering inside a partition follows it.
//! - `queue_offsets`: committed offset and partition lease per consumer group.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum QueueMessages {
    Table,
    Id,
    Topic,
    PartitionId,
    MessageKey,
    Payload,
    CreatedAt,
}

#[derive(Iden)]
enum QueueOffsets {
    Table,
    ConsumerGroup,
    Topic,
    PartitionId,
    CommittedOffset,
    Owner,
    LeaseUntil,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(QueueMessages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QueueMessages::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QueueMessages::Topic).string().not_null())
                    .col(
                        ColumnDef::new(QueueMessages::PartitionId)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(QueueMessages::MessageKey).string().not_null())
                    .col(ColumnDef::new(QueueMessages::Payload).text().not_null())
                    .col(
                        ColumnDef::new(QueueMessages::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-queue_messages-topic-partition-id")
                    .table(QueueMessages::Table)
                    .col(QueueMessages::Topic)
                    .col(QueueMessages::PartitionId)
                    .col(QueueMessages::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(QueueOffsets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QueueOffsets::ConsumerGroup)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(QueueOffsets::Topic).string().not_null())
                    .col(
                        ColumnDef::new(QueueOffsets::PartitionId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QueueOffsets::CommittedOffset)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(QueueOffsets::Owner).string())
                    .col(ColumnDef::new(QueueOffsets::LeaseUntil).timestamp())
                    .primary_key(
                        Index::create()
                            .col(QueueOffsets::ConsumerGroup)
                            .col(QueueOffsets::Topic)
                            .col(QueueOffsets::PartitionId),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QueueOffsets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QueueMessages::Table).to_owned())
            .await?;
        Ok(())
    }
}
