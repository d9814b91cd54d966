//! Durable, partitioned report queue on top of the shared database.
//!
//! Messages are appended to `queue_messages` and partitioned by key. Members
//! of a consumer group share partitions through renewable leases and commit
//! offsets after processing, which gives at-least-once delivery.

pub use broker::{DbQueue, Message};
pub use consumer::{ConsumerConfig, ConsumerGroup, MessageHandler};
pub use error::QueueError;
pub use partitioner::partition_for;
pub use producer::ReportProducer;

mod broker;
mod consumer;
mod error;
mod messages;
mod offsets;
mod partitioner;
mod producer;

/// Default topic for report requests.
pub const REPORT_TOPIC: &str = "report";

type ResultQueue<T> = Result<T, QueueError>;
