//! Newline-delimited JSON output.

use std::path::Path;

use async_trait::async_trait;
use ohlcflow_aggregate::CandleRecord;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::{Sink, SinkError};

/// Writes one JSON object per candle record.
#[derive(Debug)]
pub struct NdjsonSink<W> {
    writer: W,
    buf: Vec<u8>,
}

impl<W> NdjsonSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a sink writing to `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            buf: Vec::new(),
        }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl NdjsonSink<BufWriter<File>> {
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
impl<W> Sink for NdjsonSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, record: &CandleRecord) -> Result<(), SinkError> {
        self.buf.clear();
        serde_json::to_writer(&mut self.buf, record)?;
        self.buf.push(b'\n');
        self.writer.write_all(&self.buf).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().await?;
        Ok(())
    }
}
