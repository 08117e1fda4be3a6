//! OHLC candle data structures.

use chrono::{DateTime, TimeZone, Utc};
use ohlcflow_types::WindowKey;
use serde::{Deserialize, Serialize};

/// In-progress or final aggregate of one window.
///
/// `open` is the first folded price and never changes; `close` is the most
/// recently folded price. An aggregate always holds at least one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleAggregate {
    /// Trading symbol.
    pub symbol: String,
    /// Window index (`window_start / duration`).
    pub window_index: i64,
    /// Price of the first trade folded into the window.
    pub open: f64,
    /// Highest folded price.
    pub high: f64,
    /// Lowest folded price.
    pub low: f64,
    /// Price of the most recently folded trade.
    pub close: f64,
    /// Sum of folded trade volumes.
    pub volume: f64,
    /// Number of folded trades.
    pub trade_count: u64,
    /// Window start in epoch milliseconds (inclusive).
    pub window_start: i64,
    /// Window end in epoch milliseconds (exclusive).
    pub window_end: i64,
}

impl CandleAggregate {
    /// Returns the key of the window this aggregate belongs to.
    #[must_use]
    pub fn key(&self) -> WindowKey {
        WindowKey::new(self.symbol.clone(), self.window_index)
    }

    /// Returns the price range (high - low).
    #[must_use]
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Returns true if the window closed above its open.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Candle as handed to a sink.
///
/// Sinks upsert records keyed by `(symbol, window_end)`; a record with
/// `final = true` is the authoritative value for its window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleRecord {
    /// Trading symbol.
    pub symbol: String,
    /// Window start in epoch milliseconds (inclusive).
    pub window_start: i64,
    /// Window end in epoch milliseconds (exclusive).
    pub window_end: i64,
    /// Opening price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Total traded volume.
    pub volume: f64,
    /// Number of trades in the window.
    pub trade_count: u64,
    /// Whether this is the closing emission for the window.
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl CandleRecord {
    /// Builds a record from an aggregate.
    #[must_use]
    pub fn from_aggregate(aggregate: &CandleAggregate, is_final: bool) -> Self {
        Self {
            symbol: aggregate.symbol.clone(),
            window_start: aggregate.window_start,
            window_end: aggregate.window_end,
            open: aggregate.open,
            high: aggregate.high,
            low: aggregate.low,
            close: aggregate.close,
            volume: aggregate.volume,
            trade_count: aggregate.trade_count,
            is_final,
        }
    }

    /// Returns the sink upsert key.
    #[must_use]
    pub fn upsert_key(&self) -> (&str, i64) {
        (&self.symbol, self.window_end)
    }

    /// Returns the window start as a UTC datetime, if representable.
    #[must_use]
    pub fn start_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.window_start).single()
    }

    /// Returns the window end as a UTC datetime, if representable.
    #[must_use]
    pub fn end_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.window_end).single()
    }
}
