//! Windowed OHLC aggregation core for ohlcflow.
//!
//! This crate turns validated trades into per-symbol tumbling-window candles:
//!
//! - [`WindowResolver`] - Maps a trade to its window key and bounds
//! - [`reduce`] - The pure candle fold
//! - [`WindowStore`] - Sharded per-key aggregate state
//! - [`WindowLifecycle`] - Advance, idle and shutdown closes with final emission
//! - [`Emitter`] / [`EmissionQueue`] - Bounded, drop-oldest hand-off to the sink
//! - [`CandleAggregate`] / [`CandleRecord`] - Candle data structures
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ohlcflow_aggregate::{
//!     EmissionMode, Emitter, SystemClock, WindowLifecycle, WindowResolver, WindowStore,
//! };
//! use ohlcflow_types::Trade;
//!
//! let store = Arc::new(WindowStore::new(WindowResolver::from_millis(60_000).unwrap()));
//! let (emitter, mut queue) = Emitter::bounded(64, EmissionMode::Continuous);
//! let lifecycle = WindowLifecycle::new(store, emitter, Arc::new(SystemClock), 6_000);
//!
//! lifecycle.on_trade(&Trade::new("BTC/USD", 100.0, 1.0, 1_000).unwrap()).unwrap();
//! lifecycle.on_trade(&Trade::new("BTC/USD", 90.0, 1.0, 70_000).unwrap()).unwrap();
//!
//! let closed: Vec<_> = std::iter::from_fn(|| queue.try_recv())
//!     .filter(|record| record.is_final)
//!     .collect();
//! assert_eq!(closed.len(), 1);
//! assert_eq!(closed[0].window_end, 60_000);
//! ```

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcflow/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod candle;
mod clock;
mod emitter;
mod lifecycle;
mod reducer;
mod resolver;
mod store;

pub use candle::{CandleAggregate, CandleRecord};
pub use clock::{Clock, ManualClock, SystemClock};
pub use emitter::{EmissionMode, EmissionQueue, Emitter};
pub use lifecycle::{Applied, CloseReason, WindowLifecycle};
pub use reducer::reduce;
pub use resolver::WindowResolver;
pub use store::{LateTrade, WindowStore, shard_for};
