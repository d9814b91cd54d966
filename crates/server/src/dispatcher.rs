//! Drains the result channel and hands rendered reports to the notifier.

use std::fmt::Write as _;

use api_types::report::ReportResult;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
#[error("notify failed: {0}")]
pub struct NotifyError(pub String);

/// User-facing message sink (the chat transport).
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, user_id: i64, text: String) -> Result<(), NotifyError>;
}

/// `from: DD-MM-YYYY, to: DD-MM-YYYY` header and one `name - amount` line per
/// category, sorted by name. An empty report is `no data`.
#[must_use]
pub fn render_report(result: &ReportResult) -> String {
    if result.data.is_empty() {
        return "no data".to_string();
    }
    let mut text = format!("from: {}, to: {}\n", result.start, result.end);
    for (name, amount) in &result.data {
        let _ = writeln!(text, "{name} - {amount:.2}");
    }
    text
}

pub struct ResultDispatcher<N> {
    notifier: N,
}

impl<N: Notifier> ResultDispatcher<N> {
    pub fn new(notifier: N) -> Self {
        Self { notifier }
    }

    /// Runs until every sender is gone, so results already accepted by the
    /// RPC handler are still delivered during shutdown.
    pub async fn run(self, mut results: mpsc::Receiver<ReportResult>) {
        while let Some(result) = results.recv().await {
            let user_id = result.user_id;
            let text = render_report(&result);
            if let Err(err) = self.notifier.notify(user_id, text).await {
                tracing::error!(user_id, error = %err, "failed to deliver report to user");
            }
        }
        tracing::info!("result dispatcher stopped");
    }
}
