use api_types::report::ReportRequest;
use chrono::NaiveDate;

use crate::{DbQueue, ResultQueue};

/// Publishes report requests keyed by user, so one user's requests stay in
/// order on a single partition.
#[derive(Clone, Debug)]
pub struct ReportProducer {
    queue: DbQueue,
}

impl ReportProducer {
    pub fn new(queue: DbQueue) -> Self {
        Self { queue }
    }

    /// Fails synchronously when the message cannot be stored; the caller
    /// tells the user to retry.
    pub async fn enqueue(&self, user_id: i64, start: NaiveDate, end: NaiveDate) -> ResultQueue<()> {
        let request = ReportRequest::new(user_id, start, end);
        let payload = serde_json::to_string(&request)?;
        let (partition, offset) = self.queue.publish(&request.key(), payload).await?;
        tracing::info!(user_id, partition, offset, "report request enqueued");
        Ok(())
    }
}
