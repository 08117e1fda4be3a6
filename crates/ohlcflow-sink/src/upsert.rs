//! In-memory keyed sink.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ohlcflow_aggregate::CandleRecord;

use crate::{Sink, SinkError};

type Table = BTreeMap<(String, i64), CandleRecord>;

/// Candle table keyed by `(symbol, window_end)` with last-write-wins updates.
///
/// Clones share the same table, so a handle kept by the caller observes what
/// the engine writes.
#[derive(Debug, Clone, Default)]
pub struct UpsertSink {
    table: Arc<Mutex<Table>>,
    writes: Arc<AtomicU64>,
}

impl UpsertSink {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the stored record for a window.
    #[must_use]
    pub fn get(&self, symbol: &str, window_end: i64) -> Option<CandleRecord> {
        self.table()
            .get(&(symbol.to_string(), window_end))
            .cloned()
    }

    /// Returns all stored records ordered by symbol then window end.
    #[must_use]
    pub fn records(&self) -> Vec<CandleRecord> {
        self.table().values().cloned().collect()
    }

    /// Returns the stored records whose latest write was final.
    #[must_use]
    pub fn finals(&self) -> Vec<CandleRecord> {
        self.table()
            .values()
            .filter(|record| record.is_final)
            .cloned()
            .collect()
    }

    /// Returns the number of stored windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns true if nothing was stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Returns the number of writes received, including superseded ones.
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sink for UpsertSink {
    async fn write(&mut self, record: &CandleRecord) -> Result<(), SinkError> {
        let (symbol, window_end) = record.upsert_key();
        self.table()
            .insert((symbol.to_string(), window_end), record.clone());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}
