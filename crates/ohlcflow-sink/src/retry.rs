//! Retrying sink wrapper.

use async_trait::async_trait;
use ohlcflow_aggregate::CandleRecord;
use ohlcflow_types::Backoff;
use tracing::warn;

use crate::{Sink, SinkError};

/// Retries failed writes and flushes of an inner sink with exponential backoff.
#[derive(Debug)]
pub struct RetryingSink<S> {
    inner: S,
    backoff: Backoff,
}

impl<S: Sink> RetryingSink<S> {
    /// Wraps `inner` with the default backoff policy.
    pub fn new(inner: S) -> Self {
        Self::with_backoff(inner, Backoff::default())
    }

    /// Wraps `inner` with the given backoff policy.
    pub const fn with_backoff(inner: S, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }

    /// Returns the backoff policy.
    pub const fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// Returns the wrapped sink.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: Sink> Sink for RetryingSink<S> {
    async fn write(&mut self, record: &CandleRecord) -> Result<(), SinkError> {
        let mut attempts = 0;
        loop {
            match self.inner.write(record).await {
                Ok(()) => return Ok(()),
                Err(e) if self.backoff.should_retry(attempts) => {
                    attempts += 1;
                    let delay = self.backoff.delay(attempts);
                    warn!(
                        symbol = %record.symbol,
                        window_end = record.window_end,
                        attempt = attempts,
                        ?delay,
                        error = %e,
                        "sink write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        let mut attempts = 0;
        loop {
            match self.inner.flush().await {
                Ok(()) => return Ok(()),
                Err(e) if self.backoff.should_retry(attempts) => {
                    attempts += 1;
                    let delay = self.backoff.delay(attempts);
                    warn!(attempt = attempts, ?delay, error = %e, "sink flush failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UpsertSink;

    /// Fails the first `failures` writes, then delegates.
    struct FlakySink {
        failures: u32,
        inner: UpsertSink,
    }

    #[async_trait]
    impl Sink for FlakySink {
        async fn write(&mut self, record: &CandleRecord) -> Result<(), SinkError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(SinkError::Rejected("unavailable".to_string()));
            }
            self.inner.write(record).await
        }

        async fn flush(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    fn record() -> CandleRecord {
        CandleRecord {
            symbol: "BTC/USD".to_string(),
            window_start: 0,
            window_end: 60_000,
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            trade_count: 1,
            is_final: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let table = UpsertSink::new();
        let flaky = FlakySink {
            failures: 2,
            inner: table.clone(),
        };
        let mut sink = RetryingSink::with_backoff(flaky, Backoff::new(3, 10, 100));

        sink.write(&record()).await.unwrap();
        assert_eq!(table.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let table = UpsertSink::new();
        let flaky = FlakySink {
            failures: 5,
            inner: table.clone(),
        };
        let mut sink = RetryingSink::with_backoff(flaky, Backoff::new(2, 10, 100));

        let err = sink.write(&record()).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert!(table.is_empty());
        assert_eq!(sink.into_inner().failures, 2);
    }
}
