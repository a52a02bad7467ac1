//! Access log reports over comma-delimited web server logs.
//!
//! Lines are parsed into [`parser::LogRecord`]s, held by an
//! [`aggregate::AggregationEngine`], and summarised into a
//! [`report::ReportBundle`] together with addresses that have too many
//! failed requests.

pub mod aggregate;
pub mod anomaly;
pub mod error;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod parser;
pub mod report;
