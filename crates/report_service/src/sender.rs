//! Client side of the result-delivery RPC.

use api_types::report::{Empty, REPORT_SEND_PATH, ReportResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{status}: {message}")]
    Server { status: StatusCode, message: String },
}

/// Where computed reports go.
#[async_trait]
pub trait ResultSink: Send + Sync + 'static {
    async fn send(&self, result: &ReportResult) -> Result<(), RpcError>;
}

/// Delivers results to the chat process over HTTP/JSON.
///
/// The client has no request timeout: while the receiving side's result
/// channel is full the call stays open, which is what throttles the consumer.
#[derive(Clone, Debug)]
pub struct ReportResultSender {
    client: Client,
    base_url: String,
}

impl ReportResultSender {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            REPORT_SEND_PATH.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ResultSink for ReportResultSender {
    async fn send(&self, result: &ReportResult) -> Result<(), RpcError> {
        let resp = self.client.post(self.url()).json(result).send().await?;
        let status = resp.status();
        if status.is_success() {
            let _: Empty = resp.json().await?;
            return Ok(());
        }

        let message = match resp.json::<ErrorBody>().await {
            Ok(err) => err.error,
            Err(_) => "server error".to_string(),
        };
        Err(RpcError::Server { status, message })
    }
}
