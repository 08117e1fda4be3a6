//! Window lifecycle control.
//!
//! A window is OPEN from its first trade until one of three triggers closes
//! it: a trade for a later window of the same symbol (advance), the idle
//! sweep, or shutdown. Closing evicts the aggregate and emits it as final.
//! Triggers may race; only the one whose eviction returns the aggregate
//! emits.

use std::fmt;
use std::sync::Arc;

use ohlcflow_types::{Trade, WindowKey};
use tracing::{debug, trace};

use crate::{CandleAggregate, Clock, Emitter, LateTrade, WindowStore};

/// What closed a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// A trade for a later window of the same symbol arrived.
    Advance,
    /// The window ended more than the grace period ago and stopped trading.
    Idle,
    /// The engine is shutting down.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Advance => "advance",
            Self::Idle => "idle",
            Self::Shutdown => "shutdown",
        })
    }
}

/// Result of applying one trade.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The aggregate after folding the trade.
    pub aggregate: CandleAggregate,
    /// Number of earlier windows this trade closed.
    pub advanced: usize,
}

/// Drives windows from first trade to final emission.
#[derive(Debug, Clone)]
pub struct WindowLifecycle {
    store: Arc<WindowStore>,
    emitter: Emitter,
    clock: Arc<dyn Clock>,
    idle_grace_ms: i64,
}

impl WindowLifecycle {
    /// Creates a controller over `store`.
    #[must_use]
    pub fn new(
        store: Arc<WindowStore>,
        emitter: Emitter,
        clock: Arc<dyn Clock>,
        idle_grace_ms: i64,
    ) -> Self {
        Self {
            store,
            emitter,
            clock,
            idle_grace_ms: idle_grace_ms.max(0),
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<WindowStore> {
        &self.store
    }

    /// Returns the emitter.
    #[must_use]
    pub const fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    /// Returns the idle grace period in milliseconds.
    #[must_use]
    pub const fn idle_grace_ms(&self) -> i64 {
        self.idle_grace_ms
    }

    /// Folds `trade` into its window, emits the update and closes every
    /// earlier window of the symbol.
    ///
    /// # Errors
    ///
    /// Returns [`LateTrade`] if the trade's window is already closed. Nothing
    /// is emitted in that case.
    pub fn on_trade(&self, trade: &Trade) -> Result<Applied, LateTrade> {
        let key = self.store.resolver().resolve(trade);
        let aggregate = self.store.upsert_with(&key, trade, |updated| {
            self.emitter.emit(updated, false);
        })?;
        trace!(%key, trade_count = aggregate.trade_count, "folded trade");

        let advanced = self
            .store
            .snapshot_keys_older_than(&key.symbol, key.window_index)
            .iter()
            .filter(|older| self.close(older, CloseReason::Advance).is_some())
            .count();

        Ok(Applied {
            aggregate,
            advanced,
        })
    }

    /// Closes one window.
    ///
    /// Returns the final aggregate, or `None` if the window was not resident.
    pub fn close(&self, key: &WindowKey, reason: CloseReason) -> Option<CandleAggregate> {
        let closed = self.store.evict_with(key, |aggregate| {
            self.emitter.emit(aggregate, true);
        })?;
        log_close(&closed, reason);
        Some(closed)
    }

    /// Runs one idle sweep and returns the number of windows it closed.
    pub fn sweep(&self) -> usize {
        let now_ms = self.clock.now_ms();
        let closed = self
            .store
            .sweep_idle_with(now_ms, self.idle_grace_ms, |aggregate| {
                self.emitter.emit(aggregate, true);
            });
        for aggregate in &closed {
            log_close(aggregate, CloseReason::Idle);
        }
        if !closed.is_empty() {
            debug!(closed = closed.len(), now_ms, "idle sweep");
        }
        closed.len()
    }

    /// Closes every resident window regardless of grace.
    pub fn flush_all(&self) -> usize {
        self.store
            .resident_keys()
            .iter()
            .filter(|key| self.close(key, CloseReason::Shutdown).is_some())
            .count()
    }
}

fn log_close(closed: &CandleAggregate, reason: CloseReason) {
    debug!(
        key = %closed.key(),
        %reason,
        open = closed.open,
        high = closed.high,
        low = closed.low,
        close = closed.close,
        trades = closed.trade_count,
        "closed window"
    );
}
