//! Candle emission.
//!
//! The [`Emitter`] turns aggregates into [`CandleRecord`]s and pushes them
//! onto a bounded queue drained by the sink task. Pushing never waits: when
//! the queue is full the oldest pending record is discarded and counted.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::warn;

use crate::{CandleAggregate, CandleRecord};

/// Which updates reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmissionMode {
    /// Every update as a non-final record, plus the final record on close.
    #[default]
    Continuous,
    /// Only the final record on close.
    CloseOnly,
}

impl EmissionMode {
    /// Returns the canonical name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::CloseOnly => "close-only",
        }
    }
}

impl fmt::Display for EmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continuous" | "all" => Ok(Self::Continuous),
            "close-only" | "close_only" | "closeonly" | "final" => Ok(Self::CloseOnly),
            _ => Err(format!(
                "Unknown emission mode: {s}. Valid values: continuous, close-only"
            )),
        }
    }
}

#[derive(Debug)]
struct QueueState {
    records: VecDeque<CandleRecord>,
    dropped: u64,
    senders: usize,
    receiver_alive: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer side of the emission queue.
#[derive(Debug)]
pub struct Emitter {
    shared: Arc<Shared>,
    mode: EmissionMode,
    emitted: Arc<AtomicU64>,
}

impl Emitter {
    /// Slots allocated up front; the queue grows on demand up to its capacity.
    const INITIAL_SLOTS: usize = 1024;

    /// Creates an emitter and its queue holding at most `capacity` records
    /// (at least one).
    #[must_use]
    pub fn bounded(capacity: usize, mode: EmissionMode) -> (Self, EmissionQueue) {
        let capacity = capacity.max(1);
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                records: VecDeque::with_capacity(capacity.min(Self::INITIAL_SLOTS)),
                dropped: 0,
                senders: 1,
                receiver_alive: true,
            }),
            notify: Notify::new(),
            capacity,
        });
        let emitter = Self {
            shared: Arc::clone(&shared),
            mode,
            emitted: Arc::new(AtomicU64::new(0)),
        };
        (emitter, EmissionQueue { shared })
    }

    /// Returns the emission mode.
    #[must_use]
    pub const fn mode(&self) -> EmissionMode {
        self.mode
    }

    /// Returns the maximum number of pending records.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Queues `aggregate` as a candle record.
    ///
    /// Returns `true` if a record was queued. Non-final updates are skipped in
    /// [`EmissionMode::CloseOnly`], and nothing is queued once the queue has
    /// been dropped.
    pub fn emit(&self, aggregate: &CandleAggregate, is_final: bool) -> bool {
        if !is_final && self.mode == EmissionMode::CloseOnly {
            return false;
        }

        let record = CandleRecord::from_aggregate(aggregate, is_final);
        {
            let mut state = self.shared.lock();
            if !state.receiver_alive {
                return false;
            }
            if state.records.len() >= self.shared.capacity {
                state.records.pop_front();
                state.dropped += 1;
                // Log at 1, 2, 4, 8, ... drops to keep overload quiet.
                if state.dropped.is_power_of_two() {
                    warn!(
                        total = state.dropped,
                        capacity = self.shared.capacity,
                        "emission queue full, dropped oldest candle records"
                    );
                }
            }
            state.records.push_back(record);
        }
        self.shared.notify.notify_one();
        self.emitted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Returns the number of records queued so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

impl Clone for Emitter {
    fn clone(&self) -> Self {
        self.shared.lock().senders += 1;
        Self {
            shared: Arc::clone(&self.shared),
            mode: self.mode,
            emitted: Arc::clone(&self.emitted),
        }
    }
}

impl Drop for Emitter {
    fn drop(&mut self) {
        let last = {
            let mut state = self.shared.lock();
            state.senders -= 1;
            state.senders == 0
        };
        if last {
            self.shared.notify.notify_one();
        }
    }
}

/// Consumer side of the emission queue.
#[derive(Debug)]
pub struct EmissionQueue {
    shared: Arc<Shared>,
}

impl EmissionQueue {
    /// Waits for the next record.
    ///
    /// Returns `None` once every [`Emitter`] is gone and the queue is empty.
    pub async fn recv(&mut self) -> Option<CandleRecord> {
        loop {
            {
                let mut state = self.shared.lock();
                if let Some(record) = state.records.pop_front() {
                    return Some(record);
                }
                if state.senders == 0 {
                    return None;
                }
            }
            // `notify_one` stores a permit, so a push between the check and
            // this await is not missed.
            self.shared.notify.notified().await;
        }
    }

    /// Returns the next record if one is pending.
    pub fn try_recv(&mut self) -> Option<CandleRecord> {
        self.shared.lock().records.pop_front()
    }

    /// Returns the number of pending records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.lock().records.len()
    }

    /// Returns true if no record is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of records discarded because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.shared.lock().dropped
    }
}

impl Drop for EmissionQueue {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.receiver_alive = false;
        state.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(trade_count: u64) -> CandleAggregate {
        CandleAggregate {
            symbol: "BTC/USD".to_string(),
            window_index: 0,
            open: 100.0,
            high: 100.0,
            low: 100.0,
            close: 100.0,
            volume: 1.0,
            trade_count,
            window_start: 0,
            window_end: 60_000,
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("continuous".parse::<EmissionMode>().unwrap(), EmissionMode::Continuous);
        assert_eq!("close-only".parse::<EmissionMode>().unwrap(), EmissionMode::CloseOnly);
        assert_eq!("FINAL".parse::<EmissionMode>().unwrap(), EmissionMode::CloseOnly);
        assert!("sometimes".parse::<EmissionMode>().is_err());
        assert_eq!(EmissionMode::CloseOnly.to_string(), "close-only");
    }

    #[tokio::test]
    async fn test_continuous_emits_everything() {
        let (emitter, mut queue) = Emitter::bounded(8, EmissionMode::Continuous);
        assert!(emitter.emit(&candle(1), false));
        assert!(emitter.emit(&candle(1), true));
        drop(emitter);

        assert!(!queue.recv().await.unwrap().is_final);
        assert!(queue.recv().await.unwrap().is_final);
        assert!(queue.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_only_skips_updates() {
        let (emitter, mut queue) = Emitter::bounded(8, EmissionMode::CloseOnly);
        assert!(!emitter.emit(&candle(1), false));
        assert!(emitter.emit(&candle(2), true));
        assert_eq!(emitter.emitted(), 1);
        drop(emitter);

        let record = queue.recv().await.unwrap();
        assert!(record.is_final);
        assert_eq!(record.trade_count, 2);
        assert!(queue.recv().await.is_none());
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let (emitter, mut queue) = Emitter::bounded(2, EmissionMode::Continuous);
        for count in 1..=5 {
            assert!(emitter.emit(&candle(count), false));
        }

        assert_eq!(queue.try_recv().unwrap().trade_count, 4);
        assert_eq!(queue.try_recv().unwrap().trade_count, 5);
        assert!(queue.try_recv().is_none());
        assert_eq!(queue.dropped(), 3);
    }

    #[test]
    fn test_capacity_is_exact() {
        let (emitter, mut queue) = Emitter::bounded(3, EmissionMode::Continuous);
        assert_eq!(emitter.capacity(), 3);
        for count in 1..=4 {
            assert!(emitter.emit(&candle(count), false));
        }
        assert_eq!(queue.len(), 3);

        let received: Vec<u64> = std::iter::from_fn(|| queue.try_recv())
            .map(|record| record.trade_count)
            .collect();
        assert_eq!(received, vec![2, 3, 4]);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_huge_capacity_does_not_preallocate() {
        let (emitter, mut queue) = Emitter::bounded(usize::MAX, EmissionMode::Continuous);
        assert!(emitter.emit(&candle(1), true));
        assert_eq!(queue.try_recv().unwrap().trade_count, 1);
        assert_eq!(queue.dropped(), 0);
    }

    #[tokio::test]
    async fn test_recv_waits_for_emit_from_task() {
        let (emitter, mut queue) = Emitter::bounded(4, EmissionMode::Continuous);
        let producer = emitter.clone();
        drop(emitter);

        let task = tokio::spawn(async move {
            tokio::task::yield_now().await;
            producer.emit(&candle(7), true);
        });

        assert_eq!(queue.recv().await.unwrap().trade_count, 7);
        task.await.unwrap();
        assert!(queue.recv().await.is_none());
    }

    #[test]
    fn test_emit_after_queue_dropped() {
        let (emitter, queue) = Emitter::bounded(2, EmissionMode::Continuous);
        drop(queue);
        assert!(!emitter.emit(&candle(1), true));
    }
}
