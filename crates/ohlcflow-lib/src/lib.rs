//! Streaming trade-to-candle aggregation.
//!
//! This is a facade crate that re-exports functionality from the ohlcflow
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use ohlcflow_lib::prelude::*;
//! use tokio::io::BufReader;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::new("1m".parse()?, ["BTC/USD", "ETH/USD"]);
//!     let sink = NdjsonSink::new(tokio::io::stdout());
//!     let engine = Engine::start(config, sink)?;
//!
//!     let mut trades = std::pin::pin!(ndjson_trades(BufReader::new(tokio::io::stdin())));
//!     while let Some(raw) = trades.next().await {
//!         engine.submit_raw(raw?).await?;
//!     }
//!
//!     println!("{}", engine.shutdown().await?.stats);
//!     Ok(())
//! }
//! ```

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcflow/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use ohlcflow_types::*;

// Re-export the aggregation core
pub use ohlcflow_aggregate::{
    Applied, CandleAggregate, CandleRecord, Clock, CloseReason, EmissionMode, EmissionQueue,
    Emitter, LateTrade, ManualClock, SystemClock, WindowLifecycle, WindowResolver, WindowStore,
    reduce, shard_for,
};

// Re-export sinks
pub use ohlcflow_sink::{CsvSink, NdjsonSink, OutputFormat, RetryingSink, Sink, SinkError, UpsertSink};

// Re-export ingestion
#[cfg(feature = "ingest")]
pub use ohlcflow_ingest::{
    ClientConfig, IngestError, KrakenClient, TradeBatch, TradePage, backfill_stream, ndjson_trades,
    parse_line, parse_trades_page, parse_ws_message,
};

// Re-export the engine runtime
#[cfg(feature = "engine")]
pub use ohlcflow_engine::{
    Admission, Engine, EngineConfig, EngineError, EngineHandle, EngineReport, EngineStats,
    StatsSnapshot,
};

/// Prelude module for convenient imports.
///
/// ```
/// use ohlcflow_lib::prelude::*;
/// ```
pub mod prelude {
    pub use ohlcflow_types::{
        Backoff, ConfigError, OhlcError, RawTrade, Result, TimeRange, Trade, TradeError,
        WindowKey, WindowSpec,
    };

    pub use ohlcflow_aggregate::{CandleAggregate, CandleRecord, EmissionMode};

    pub use ohlcflow_sink::{CsvSink, NdjsonSink, OutputFormat, RetryingSink, Sink, UpsertSink};

    #[cfg(feature = "ingest")]
    pub use ohlcflow_ingest::{ClientConfig, KrakenClient, TradeBatch, backfill_stream, ndjson_trades};

    #[cfg(feature = "engine")]
    pub use ohlcflow_engine::{Engine, EngineConfig, EngineHandle, EngineReport};
}
