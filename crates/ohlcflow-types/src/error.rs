//! Error types for ohlcflow.

use thiserror::Error;

/// Result type alias for ohlcflow operations.
pub type Result<T> = std::result::Result<T, OhlcError>;

/// Top-level error for the ohlcflow crates.
#[derive(Error, Debug)]
pub enum OhlcError {
    /// Invalid engine configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A trade record failed validation.
    #[error(transparent)]
    Trade(#[from] TradeError),

    /// Invalid time range.
    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors. These are fatal at startup, before any trade is processed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Window duration must be strictly positive.
    #[error("window duration must be positive, got {0}ms")]
    NonPositiveWindow(i64),

    /// Idle grace period must not be negative.
    #[error("idle grace must not be negative, got {0}ms")]
    NegativeGrace(i64),

    /// No symbols were configured.
    #[error("symbol set is empty")]
    EmptySymbols,

    /// A symbol appears more than once in the symbol set.
    #[error("duplicate symbol in symbol set: {0}")]
    DuplicateSymbol(String),

    /// A symbol in the symbol set is blank.
    #[error("symbol set contains a blank entry")]
    BlankSymbol,

    /// Worker pool size must be at least one.
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    /// A queue was configured with zero capacity.
    #[error("{0} capacity must be at least 1")]
    ZeroCapacity(&'static str),

    /// A queue or pool was configured larger than the engine allows.
    #[error("{name} capacity {requested} exceeds the maximum of {max}")]
    CapacityTooLarge {
        /// Which knob.
        name: &'static str,
        /// Configured value.
        requested: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// Sweep interval must be strictly positive.
    #[error("sweep interval must be positive")]
    ZeroSweepInterval,
}

/// Reasons a raw trade record is rejected by the normalizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// The symbol is empty or whitespace.
    #[error("empty symbol")]
    EmptySymbol,

    /// Price is NaN or infinite.
    #[error("non-finite price: {0}")]
    NonFinitePrice(f64),

    /// Price is zero or negative.
    #[error("non-positive price: {0}")]
    NonPositivePrice(f64),

    /// Volume is NaN, infinite or negative.
    #[error("invalid volume: {0}")]
    InvalidVolume(f64),

    /// Timestamp could not be interpreted.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Error for invalid time ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeRangeError {
    /// Range start is not before range end.
    #[error("invalid time range: {from_ms} >= {to_ms}")]
    Empty {
        /// Range start in epoch milliseconds.
        from_ms: i64,
        /// Range end in epoch milliseconds.
        to_ms: i64,
    },

    /// A bound could not be parsed.
    #[error("invalid time bound '{0}', expected YYYY-MM-DD, RFC 3339 or epoch milliseconds")]
    Parse(String),
}
