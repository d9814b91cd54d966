//! Wire types shared by the chat process and the report service.
//!
//! Every type in here crosses a process boundary (queue message or RPC
//! payload), so field names are part of the contract.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod date {
    //! Calendar-day codec used on the wire (`DD-MM-YYYY`).

    use super::*;

    pub const DATE_FORMAT: &str = "%d-%m-%Y";

    #[must_use]
    pub fn format_date(date: NaiveDate) -> String {
        date.format(DATE_FORMAT).to_string()
    }

    pub fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
    }
}

pub mod report {
    use std::collections::BTreeMap;

    use super::{
        date::{format_date, parse_date},
        *,
    };

    /// Route of the unary result-delivery call.
    pub const REPORT_SEND_PATH: &str = "/report.Report/Send";

    /// Report computation request published on the report topic.
    ///
    /// Keyed by `user_id`, so all requests of one user land on the same
    /// partition and are consumed in order.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReportRequest {
        pub user_id: i64,
        pub start: String,
        pub end: String,
    }

    impl ReportRequest {
        #[must_use]
        pub fn new(user_id: i64, start: NaiveDate, end: NaiveDate) -> Self {
            Self {
                user_id,
                start: format_date(start),
                end: format_date(end),
            }
        }

        /// Partition key of the request.
        #[must_use]
        pub fn key(&self) -> String {
            self.user_id.to_string()
        }

        pub fn dates(&self) -> Result<(NaiveDate, NaiveDate), chrono::ParseError> {
            Ok((parse_date(&self.start)?, parse_date(&self.end)?))
        }
    }

    /// Computed report delivered back to the requesting process over RPC.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ReportResult {
        pub user_id: i64,
        pub start: String,
        pub end: String,
        #[serde(default)]
        pub data: BTreeMap<String, f64>,
    }

    impl ReportResult {
        pub fn dates(&self) -> Result<(NaiveDate, NaiveDate), chrono::ParseError> {
            Ok((parse_date(&self.start)?, parse_date(&self.end)?))
        }
    }

    /// Empty RPC acknowledgement.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Empty {}
}
