//! Report consumer: queue message → report → RPC.
//!
//! Every failure on this path is logged and swallowed. The message is
//! acknowledged anyway, so a request that cannot be parsed or computed is
//! dropped and the requester gets nothing.

use std::collections::BTreeMap;

use api_types::report::{ReportRequest, ReportResult};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use engine::Engine;
use queue::{Message, MessageHandler};

use crate::ResultSink;

pub struct ReportConsumer<S> {
    engine: Engine,
    sink: S,
}

impl<S: ResultSink> ReportConsumer<S> {
    pub fn new(engine: Engine, sink: S) -> Self {
        Self { engine, sink }
    }

    /// Compute the report for one request. `None` when it has to be dropped.
    pub async fn compute(&self, payload: &str) -> Option<ReportResult> {
        let request: ReportRequest = match serde_json::from_str(payload) {
            Ok(request) => request,
            Err(err) => {
                tracing::error!(error = %err, "failed to parse report request");
                return None;
            }
        };
        let (start, end) = match request.dates() {
            Ok(dates) => dates,
            Err(err) => {
                tracing::error!(
                    user_id = request.user_id,
                    start = %request.start,
                    end = %request.end,
                    error = %err,
                    "failed to parse report dates"
                );
                return None;
            }
        };

        let (sums, currency) = match self
            .engine
            .stats_by(start_of(start), start_of(end))
            .await
        {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(user_id = request.user_id, error = %err, "failed to compute report");
                return None;
            }
        };
        tracing::debug!(user_id = request.user_id, %currency, categories = sums.len(), "report computed");

        let data: BTreeMap<String, f64> = sums
            .into_iter()
            .map(|(name, amount)| (name, amount.to_f64()))
            .collect();
        Some(ReportResult {
            user_id: request.user_id,
            start: request.start,
            end: request.end,
            data,
        })
    }
}

fn start_of(day: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

#[async_trait]
impl<S: ResultSink> MessageHandler for ReportConsumer<S> {
    async fn handle(&self, message: &Message) {
        let Some(result) = self.compute(&message.payload).await else {
            return;
        };
        let user_id = result.user_id;
        match self.sink.send(&result).await {
            Ok(()) => tracing::info!(user_id, offset = message.offset, "report delivered"),
            Err(err) => {
                tracing::error!(user_id, offset = message.offset, error = %err, "report delivery failed");
            }
        }
    }
}
