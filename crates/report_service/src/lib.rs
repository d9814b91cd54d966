//! Report service: consumes report requests, computes them through the
//! engine's cached aggregator and delivers results back over RPC.

pub use consumer::ReportConsumer;
pub use sender::{ReportResultSender, ResultSink, RpcError};

mod consumer;
mod sender;
