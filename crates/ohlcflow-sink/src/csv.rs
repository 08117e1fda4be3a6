//! CSV output.

use std::path::Path;

use async_trait::async_trait;
use csv_async::{AsyncWriter, AsyncWriterBuilder};
use ohlcflow_aggregate::CandleRecord;
use tokio::fs::File;
use tokio::io::{AsyncWrite, BufWriter};

use crate::{Sink, SinkError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const HEADER: [&str; 10] = [
    "symbol",
    "window_start",
    "window_end",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "trade_count",
    "final",
];

/// Writes candle records as delimited rows.
///
/// The header row is written before the first record. Fields containing the
/// delimiter, quotes or line breaks are quoted.
pub struct CsvSink<W: AsyncWrite + Unpin> {
    writer: AsyncWriter<W>,
    include_header: bool,
    header_written: bool,
}

impl<W: AsyncWrite + Unpin> std::fmt::Debug for CsvSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink")
            .field("include_header", &self.include_header)
            .field("header_written", &self.header_written)
            .finish_non_exhaustive()
    }
}

impl<W> CsvSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a comma-separated sink with a header row.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, b',', true)
    }

    /// Creates a tab-separated sink with a header row.
    pub fn tsv(writer: W) -> Self {
        Self::with_options(writer, b'\t', true)
    }

    /// Creates a sink with the given field delimiter and header setting.
    pub fn with_options(writer: W, delimiter: u8, include_header: bool) -> Self {
        let writer = AsyncWriterBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .create_writer(writer);
        Self {
            writer,
            include_header,
            header_written: false,
        }
    }

    /// Flushes buffered rows and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub async fn into_inner(self) -> Result<W, SinkError> {
        self.writer
            .into_inner()
            .await
            .map_err(|e| SinkError::Io(std::io::Error::new(e.kind(), e.to_string())))
    }
}

fn format_timestamp(ms: i64, datetime: Option<chrono::DateTime<chrono::Utc>>) -> String {
    datetime.map_or_else(
        || ms.to_string(),
        |dt| dt.format(TIMESTAMP_FORMAT).to_string(),
    )
}

impl CsvSink<BufWriter<File>> {
    /// Creates (or truncates) a file at `path` and writes to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let file = File::create(path).await?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

#[async_trait]
impl<W> Sink for CsvSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, record: &CandleRecord) -> Result<(), SinkError> {
        if self.include_header && !self.header_written {
            self.writer.write_record(&HEADER).await?;
            self.header_written = true;
        }

        let row = [
            record.symbol.clone(),
            format_timestamp(record.window_start, record.start_datetime()),
            format_timestamp(record.window_end, record.end_datetime()),
            record.open.to_string(),
            record.high.to_string(),
            record.low.to_string(),
            record.close.to_string(),
            record.volume.to_string(),
            record.trade_count.to_string(),
            record.is_final.to_string(),
        ];
        self.writer.write_record(&row).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().await?;
        Ok(())
    }
}
