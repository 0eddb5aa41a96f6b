// src/fetch/mod.rs
//! Getting the latest settlement report off the report service.

pub mod calendar;
pub mod report;
pub mod transport;

pub use calendar::{resolve, Lookback};
pub use report::{Report, ReportFetcher, LOOKBACK_ATTEMPTS};
pub use transport::{Credentials, HttpTransport, Response, RetryPolicy, Transport};

/// CME DataMine single-file download endpoint.
pub const DEFAULT_BASE_ENDPOINT: &str = "https://datamine.cmegroup.com/cme/api/v1/download";
