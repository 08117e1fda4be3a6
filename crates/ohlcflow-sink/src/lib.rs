//! Candle sinks for ohlcflow.
//!
//! This crate provides the output side of the engine:
//!
//! - [`Sink`] - Async destination for candle records
//! - [`NdjsonSink`] - Newline-delimited JSON over any async writer
//! - [`CsvSink`] - CSV over any async writer
//! - [`UpsertSink`] - In-memory table keyed by `(symbol, window_end)`
//! - [`RetryingSink`] - Exponential-backoff retries around another sink

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcflow/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod csv;
mod ndjson;
mod retry;
mod sink;
mod upsert;

pub use crate::csv::CsvSink;
pub use ndjson::NdjsonSink;
pub use retry::RetryingSink;
pub use sink::{OutputFormat, Sink, SinkError};
pub use upsert::UpsertSink;
