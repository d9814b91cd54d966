use sea_orm::DbErr;
use thiserror::Error;

/// Queue errors. Publish-side errors reach the caller; consume-side errors
/// are logged by the partition loop.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("payload error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("partition {partition} out of range (0..{partitions})")]
    InvalidPartition { partition: i32, partitions: i32 },
    #[error("lease on partition {0} lost")]
    LeaseLost(i32),
}
