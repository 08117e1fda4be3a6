//! Core types for the ohlcflow trade-to-candle engine.
//!
//! This crate provides the fundamental data structures used throughout ohlcflow:
//!
//! - [`Trade`] - A validated trade with symbol, price, volume and event time
//! - [`RawTrade`] - An upstream trade record before normalization
//! - [`WindowSpec`] - Tumbling window duration
//! - [`WindowKey`] - `(symbol, window_index)` identity of a window
//! - [`TimeRange`] - Half-open range for historical backfill
//! - [`Backoff`] - Retry delay policy shared by the HTTP client and sinks

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcflow/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod backoff;
mod error;
mod time_range;
mod trade;
mod window;

pub use backoff::Backoff;
pub use error::{ConfigError, OhlcError, Result, TimeRangeError, TradeError};
pub use time_range::{TimeRange, parse_bound};
pub use trade::{RawTimestamp, RawTrade, Trade};
pub use window::{WindowKey, WindowSpec, WindowSpecParseError};
