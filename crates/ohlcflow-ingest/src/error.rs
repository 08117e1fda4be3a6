//! Ingestion errors.

use thiserror::Error;

/// Errors that can occur while fetching or decoding trades.
#[derive(Error, Debug)]
pub enum IngestError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server kept returning an error status.
    #[error("Server error: {status}")]
    ServerError {
        /// HTTP status code.
        status: u16,
    },

    /// The exchange reported errors in the response body.
    #[error("Exchange error: {}", .0.join("; "))]
    Api(Vec<String>),

    /// The payload did not have the expected shape.
    #[error("Unexpected payload: {0}")]
    Format(String),

    /// JSON decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while reading a trade stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
