//! Aggregation engine runtime for ohlcflow.
//!
//! This crate wires the aggregation core into a running service:
//!
//! - [`EngineConfig`] - Window, symbol set and runtime knobs
//! - [`Engine`] / [`EngineHandle`] - Worker pool, idle sweep and sink drain
//! - [`EngineStats`] / [`StatsSnapshot`] - Runtime counters

#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ohlcflow/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod engine;
mod error;
mod stats;

pub use config::EngineConfig;
pub use engine::{Admission, Engine, EngineHandle, EngineReport};
pub use error::EngineError;
pub use stats::{EngineStats, StatsSnapshot};
