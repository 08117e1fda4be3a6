//! Trade ingestion for ohlcflow.
//!
//! This crate provides the input side of the engine:
//!
//! - [`KrakenClient`] - HTTP client with connection pooling and retries
//! - [`parse_trades_page`] / [`parse_ws_message`] - Exchange payload decoding
//! - [`backfill_stream`] - Paginated historical trades for a time range
//! - [`ndjson_trades`] - Live trades from newline-delimited JSON

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcflow/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod ndjson;
mod parse;
mod stream;

pub use client::{ClientConfig, DEFAULT_BASE_URL, KrakenClient};
pub use error::IngestError;
pub use ndjson::ndjson_trades;
pub use parse::{TradePage, parse_line, parse_trades_page, parse_ws_message};
pub use stream::{TradeBatch, backfill_stream};
