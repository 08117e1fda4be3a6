//! Sink construction for the CLI.

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use ohlcflow_lib::prelude::*;
use tokio::io::BufWriter;

use crate::OutputArgs;

/// Opens the configured candle sink, wrapped with retries.
pub(crate) async fn open_sink(args: &OutputArgs) -> Result<RetryingSink<Box<dyn Sink>>> {
    let sink: Box<dyn Sink> = match (&args.output, args.format) {
        (Some(path), OutputFormat::Ndjson) => Box::new(
            NdjsonSink::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        (Some(path), OutputFormat::Csv) => Box::new(
            CsvSink::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        (None, OutputFormat::Ndjson) => {
            Box::new(NdjsonSink::new(BufWriter::new(tokio::io::stdout())))
        }
        (None, OutputFormat::Csv) => Box::new(CsvSink::new(BufWriter::new(tokio::io::stdout()))),
    };

    let backoff = Backoff::new(args.sink_retries, 100, 5_000);
    Ok(RetryingSink::with_backoff(sink, backoff))
}

/// Formats epoch milliseconds for progress messages.
pub(crate) fn format_ms(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map_or_else(|| ms.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}
