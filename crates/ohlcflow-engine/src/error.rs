//! Engine errors.

use ohlcflow_types::ConfigError;
use thiserror::Error;

/// Errors surfaced by the engine runtime.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The engine is shutting down and no longer accepts trades.
    #[error("engine is closed")]
    Closed,

    /// A background task panicked or was cancelled.
    #[error("engine task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
