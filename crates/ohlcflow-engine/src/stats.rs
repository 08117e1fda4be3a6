//! Engine counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ohlcflow_aggregate::CloseReason;

/// Live counters updated by the engine tasks.
#[derive(Debug, Default)]
pub struct EngineStats {
    trades_accepted: AtomicU64,
    trades_malformed: AtomicU64,
    trades_unknown_symbol: AtomicU64,
    trades_late: AtomicU64,
    closed_advance: AtomicU64,
    closed_idle: AtomicU64,
    closed_shutdown: AtomicU64,
    records_written: AtomicU64,
    records_dropped: AtomicU64,
    sink_failures: AtomicU64,
}

impl EngineStats {
    pub(crate) fn trade_accepted(&self) {
        self.trades_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn trade_malformed(&self) {
        self.trades_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn trade_unknown_symbol(&self) {
        self.trades_unknown_symbol.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn trade_late(&self) {
        self.trades_late.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn windows_closed(&self, reason: CloseReason, count: usize) {
        let counter = match reason {
            CloseReason::Advance => &self.closed_advance,
            CloseReason::Idle => &self.closed_idle,
            CloseReason::Shutdown => &self.closed_shutdown,
        };
        counter.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_records_dropped(&self, dropped: u64) {
        self.records_dropped.store(dropped, Ordering::Relaxed);
    }

    pub(crate) fn sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            trades_accepted: self.trades_accepted.load(Ordering::Relaxed),
            trades_malformed: self.trades_malformed.load(Ordering::Relaxed),
            trades_unknown_symbol: self.trades_unknown_symbol.load(Ordering::Relaxed),
            trades_late: self.trades_late.load(Ordering::Relaxed),
            closed_advance: self.closed_advance.load(Ordering::Relaxed),
            closed_idle: self.closed_idle.load(Ordering::Relaxed),
            closed_shutdown: self.closed_shutdown.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`EngineStats`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Trades folded into a window.
    pub trades_accepted: u64,
    /// Records rejected by normalization.
    pub trades_malformed: u64,
    /// Trades for symbols outside the configured set.
    pub trades_unknown_symbol: u64,
    /// Trades for already closed windows.
    pub trades_late: u64,
    /// Windows closed by a later trade of the same symbol.
    pub closed_advance: u64,
    /// Windows closed by the idle sweep.
    pub closed_idle: u64,
    /// Windows closed by the shutdown flush.
    pub closed_shutdown: u64,
    /// Candle records written to the sink.
    pub records_written: u64,
    /// Candle records dropped because the emission queue was full.
    pub records_dropped: u64,
    /// Sink writes that failed after retries.
    pub sink_failures: u64,
}

impl StatsSnapshot {
    /// Total windows closed by any trigger.
    #[must_use]
    pub const fn windows_closed(&self) -> u64 {
        self.closed_advance + self.closed_idle + self.closed_shutdown
    }

    /// Total trades dropped before aggregation.
    #[must_use]
    pub const fn trades_rejected(&self) -> u64 {
        self.trades_malformed + self.trades_unknown_symbol + self.trades_late
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} trades ({} malformed, {} unknown symbol, {} late), {} windows closed \
             ({} advance, {} idle, {} shutdown), {} records written, {} dropped, {} sink failures",
            self.trades_accepted,
            self.trades_malformed,
            self.trades_unknown_symbol,
            self.trades_late,
            self.windows_closed(),
            self.closed_advance,
            self.closed_idle,
            self.closed_shutdown,
            self.records_written,
            self.records_dropped,
            self.sink_failures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = EngineStats::default();
        stats.trade_accepted();
        stats.trade_accepted();
        stats.trade_late();
        stats.windows_closed(CloseReason::Advance, 2);
        stats.windows_closed(CloseReason::Shutdown, 1);
        stats.set_records_dropped(5);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.trades_accepted, 2);
        assert_eq!(snapshot.trades_rejected(), 1);
        assert_eq!(snapshot.windows_closed(), 3);
        assert_eq!(snapshot.records_dropped, 5);
        assert!(snapshot.to_string().starts_with("2 trades (0 malformed"));
    }
}
