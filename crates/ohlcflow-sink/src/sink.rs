//! Sink abstraction.

use async_trait::async_trait;
use ohlcflow_aggregate::CandleRecord;
use thiserror::Error;

/// Output format identifier for stream sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    /// Newline-delimited JSON, one record per line.
    #[default]
    Ndjson,
    /// CSV with a header row.
    Csv,
}

impl OutputFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Ndjson => "ndjson",
            Self::Csv => "csv",
        }
    }

    /// Returns all available formats.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Ndjson, Self::Csv]
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ndjson" | "jsonl" | "json" => Ok(Self::Ndjson),
            "csv" => Ok(Self::Csv),
            _ => Err(SinkError::UnknownFormat(s.to_string())),
        }
    }
}

/// Errors that can occur while writing candles.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Unknown output format.
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    /// The downstream store rejected the record.
    #[error("Rejected by sink: {0}")]
    Rejected(String),
}

/// Destination for candle records.
///
/// Records for the same `(symbol, window_end)` may arrive many times; the
/// latest one wins and a record with `is_final` set is authoritative.
#[async_trait]
pub trait Sink: Send {
    /// Writes one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written.
    async fn write(&mut self, record: &CandleRecord) -> Result<(), SinkError>;

    /// Flushes buffered records.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    async fn flush(&mut self) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: Sink + ?Sized> Sink for Box<S> {
    async fn write(&mut self, record: &CandleRecord) -> Result<(), SinkError> {
        (**self).write(record).await
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush().await
    }
}
