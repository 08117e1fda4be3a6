//! Window state store.
//!
//! Holds exactly one aggregate per resident window. The store is split into
//! shards by symbol hash, each behind its own mutex, and a symbol always lands
//! in the same shard, so every operation on a key is serialized by one lock.
//!
//! Per symbol the store also remembers the highest window index known to be
//! closed (`sealed_through`). Opening window `i` seals every index below `i`;
//! evicting window `j` seals `j`. Trades for sealed windows are rejected as
//! [`LateTrade`] instead of resurrecting a closed window.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ohlcflow_types::{Trade, WindowKey};
use thiserror::Error;

use crate::{CandleAggregate, WindowResolver, reduce};

/// A trade arrived for a window that is already closed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("late trade for {key}: windows through index {sealed_through} are closed")]
pub struct LateTrade {
    /// The window the trade maps to.
    pub key: WindowKey,
    /// Highest closed window index for the symbol.
    pub sealed_through: i64,
}

#[derive(Debug)]
struct Slot {
    aggregate: CandleAggregate,
    /// Sweep epoch current when the slot last received a trade.
    touched_epoch: u64,
}

impl Slot {
    /// Untouched since the sweep that started at `previous` and past its grace.
    fn is_idle(&self, previous: u64, now_ms: i64, grace_ms: i64) -> bool {
        self.touched_epoch < previous
            && self.aggregate.window_end.saturating_add(grace_ms) <= now_ms
    }
}

#[derive(Debug, Default)]
struct SymbolWindows {
    windows: BTreeMap<i64, Slot>,
    sealed_through: Option<i64>,
}

impl SymbolWindows {
    fn seal(&mut self, window_index: i64) {
        self.sealed_through = Some(
            self.sealed_through
                .map_or(window_index, |sealed| sealed.max(window_index)),
        );
    }
}

type Shard = HashMap<String, SymbolWindows>;

/// Sharded in-memory map from [`WindowKey`] to [`CandleAggregate`].
#[derive(Debug)]
pub struct WindowStore {
    resolver: WindowResolver,
    shards: Box<[Mutex<Shard>]>,
    sweep_epoch: AtomicU64,
}

impl WindowStore {
    /// Default number of shards.
    pub const DEFAULT_SHARDS: usize = 16;

    /// Creates an empty store with the default shard count.
    #[must_use]
    pub fn new(resolver: WindowResolver) -> Self {
        Self::with_shards(resolver, Self::DEFAULT_SHARDS)
    }

    /// Creates an empty store with `shard_count` shards (at least one).
    #[must_use]
    pub fn with_shards(resolver: WindowResolver, shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(Shard::new()))
            .collect();
        Self {
            resolver,
            shards,
            sweep_epoch: AtomicU64::new(0),
        }
    }

    /// Returns the resolver used to derive window bounds.
    #[must_use]
    pub const fn resolver(&self) -> &WindowResolver {
        &self.resolver
    }

    /// Returns the number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, symbol: &str) -> MutexGuard<'_, Shard> {
        self.shards[shard_for(symbol, self.shards.len())]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Folds `trade` into the aggregate for `key` and returns the new value.
    ///
    /// The read, reduce and write happen under the key's shard lock.
    ///
    /// # Errors
    ///
    /// Returns [`LateTrade`] if the window is already closed.
    pub fn upsert(&self, key: &WindowKey, trade: &Trade) -> Result<CandleAggregate, LateTrade> {
        self.upsert_with(key, trade, |_| ())
    }

    /// Like [`upsert`](Self::upsert), but calls `on_update` with the new
    /// aggregate before the shard lock is released.
    ///
    /// Anything `on_update` does is ordered with respect to every other
    /// operation on the same key.
    ///
    /// # Errors
    ///
    /// Returns [`LateTrade`] if the window is already closed.
    pub fn upsert_with<F>(
        &self,
        key: &WindowKey,
        trade: &Trade,
        on_update: F,
    ) -> Result<CandleAggregate, LateTrade>
    where
        F: FnOnce(&CandleAggregate),
    {
        debug_assert_eq!(key.symbol, trade.symbol());

        let mut shard = self.shard(&key.symbol);
        let epoch = self.sweep_epoch.load(Ordering::Acquire);
        let symbol = shard.entry(key.symbol.clone()).or_default();

        if let Some(sealed_through) = symbol
            .sealed_through
            .filter(|sealed| key.window_index <= *sealed)
        {
            return Err(LateTrade {
                key: key.clone(),
                sealed_through,
            });
        }

        let existing = symbol
            .windows
            .remove(&key.window_index)
            .map(|slot| slot.aggregate);
        if existing.is_none() {
            symbol.seal(key.window_index.saturating_sub(1));
        }

        let aggregate = reduce(existing, trade, &self.resolver);
        on_update(&aggregate);
        symbol.windows.insert(
            key.window_index,
            Slot {
                aggregate: aggregate.clone(),
                touched_epoch: epoch,
            },
        );
        Ok(aggregate)
    }

    /// Removes and returns the aggregate for `key`.
    ///
    /// Returns `None` if the window is not resident, e.g. because it was
    /// already closed by the other trigger.
    pub fn evict(&self, key: &WindowKey) -> Option<CandleAggregate> {
        self.evict_with(key, |_| ())
    }

    /// Like [`evict`](Self::evict), but calls `on_evict` with the removed
    /// aggregate before the shard lock is released. Not called when nothing
    /// was resident.
    pub fn evict_with<F>(&self, key: &WindowKey, on_evict: F) -> Option<CandleAggregate>
    where
        F: FnOnce(&CandleAggregate),
    {
        let mut shard = self.shard(&key.symbol);
        let symbol = shard.get_mut(&key.symbol)?;
        let slot = symbol.windows.remove(&key.window_index)?;
        symbol.seal(key.window_index);
        on_evict(&slot.aggregate);
        Some(slot.aggregate)
    }

    /// Returns the resident keys of `symbol` with an index below `window_index`.
    #[must_use]
    pub fn snapshot_keys_older_than(&self, symbol: &str, window_index: i64) -> Vec<WindowKey> {
        let shard = self.shard(symbol);
        shard.get(symbol).map_or_else(Vec::new, |windows| {
            windows
                .windows
                .range(..window_index)
                .map(|(index, _)| WindowKey::new(symbol, *index))
                .collect()
        })
    }

    /// Starts a sweep and returns the keys that are idle.
    ///
    /// A window is idle when `window_end + grace_ms <= now_ms` and it received
    /// no trade since the previous call. Read-only apart from advancing the
    /// sweep epoch; see [`sweep_idle_with`](Self::sweep_idle_with) to close
    /// idle windows.
    #[must_use]
    pub fn idle_keys(&self, now_ms: i64, grace_ms: i64) -> Vec<WindowKey> {
        let previous = self.sweep_epoch.fetch_add(1, Ordering::AcqRel);
        let mut idle = Vec::new();

        for shard in &self.shards {
            let shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
            for (symbol, windows) in shard.iter() {
                idle.extend(
                    windows
                        .windows
                        .iter()
                        .filter(|(_, slot)| slot.is_idle(previous, now_ms, grace_ms))
                        .map(|(index, _)| WindowKey::new(symbol.as_str(), *index)),
                );
            }
        }

        idle
    }

    /// Starts a sweep and evicts every idle window, calling `on_evict` for
    /// each before its shard lock is released.
    ///
    /// Idleness is decided under the same lock as the eviction, so a trade
    /// folded into a window either keeps it open or is rejected as late;
    /// it is never folded in after the window was chosen for closing.
    pub fn sweep_idle_with<F>(
        &self,
        now_ms: i64,
        grace_ms: i64,
        mut on_evict: F,
    ) -> Vec<CandleAggregate>
    where
        F: FnMut(&CandleAggregate),
    {
        let previous = self.sweep_epoch.fetch_add(1, Ordering::AcqRel);
        let mut closed = Vec::new();

        for shard in &self.shards {
            let mut shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
            for windows in shard.values_mut() {
                let idle: Vec<i64> = windows
                    .windows
                    .iter()
                    .filter(|(_, slot)| slot.is_idle(previous, now_ms, grace_ms))
                    .map(|(index, _)| *index)
                    .collect();
                for index in idle {
                    if let Some(slot) = windows.windows.remove(&index) {
                        windows.seal(index);
                        on_evict(&slot.aggregate);
                        closed.push(slot.aggregate);
                    }
                }
            }
        }

        closed
    }

    /// Returns every resident key.
    #[must_use]
    pub fn resident_keys(&self) -> Vec<WindowKey> {
        let mut keys = Vec::new();
        for shard in &self.shards {
            let shard = shard.lock().unwrap_or_else(PoisonError::into_inner);
            for (symbol, windows) in shard.iter() {
                keys.extend(
                    windows
                        .windows
                        .keys()
                        .map(|index| WindowKey::new(symbol.as_str(), *index)),
                );
            }
        }
        keys.sort();
        keys
    }

    /// Returns the current aggregate for `key` without modifying it.
    #[must_use]
    pub fn get(&self, key: &WindowKey) -> Option<CandleAggregate> {
        let shard = self.shard(&key.symbol);
        shard
            .get(&key.symbol)?
            .windows
            .get(&key.window_index)
            .map(|slot| slot.aggregate.clone())
    }

    /// Returns the number of resident windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| {
                shard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .values()
                    .map(|windows| windows.windows.len())
                    .sum::<usize>()
            })
            .sum()
    }

    /// Returns true if no window is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns the shard (or worker) index for a symbol.
///
/// Deterministic for the lifetime of the process, so the store and the
/// worker pool agree on symbol placement.
#[must_use]
pub fn shard_for(symbol: &str, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    symbol.hash(&mut hasher);
    (hasher.finish() % shard_count.max(1) as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn store() -> WindowStore {
        WindowStore::with_shards(WindowResolver::from_millis(60_000).unwrap(), 4)
    }

    fn upsert(store: &WindowStore, symbol: &str, price: f64, t: i64) -> Result<CandleAggregate, LateTrade> {
        let trade = Trade::new(symbol, price, 1.0, t).unwrap();
        let key = store.resolver().resolve(&trade);
        store.upsert(&key, &trade)
    }

    #[test]
    fn test_upsert_creates_then_updates() {
        let store = store();
        let first = upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();
        assert_eq!(first.trade_count, 1);

        let second = upsert(&store, "BTC/USD", 105.0, 2_000).unwrap();
        assert_eq!(second.trade_count, 2);
        assert_relative_eq!(second.open, 100.0);
        assert_relative_eq!(second.high, 105.0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evict_is_idempotent() {
        let store = store();
        upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();
        let key = WindowKey::new("BTC/USD", 0);

        let evicted = store.evict(&key).unwrap();
        assert_eq!(evicted.trade_count, 1);
        assert!(store.evict(&key).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_evict_unknown_symbol() {
        assert!(store().evict(&WindowKey::new("ETH/USD", 3)).is_none());
    }

    #[test]
    fn test_snapshot_keys_older_than() {
        let store = store();
        upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();
        upsert(&store, "BTC/USD", 101.0, 61_000).unwrap();
        upsert(&store, "BTC/USD", 102.0, 181_000).unwrap();
        upsert(&store, "ETH/USD", 10.0, 1_000).unwrap();

        let older = store.snapshot_keys_older_than("BTC/USD", 3);
        assert_eq!(
            older,
            vec![WindowKey::new("BTC/USD", 0), WindowKey::new("BTC/USD", 1)]
        );
        assert!(store.snapshot_keys_older_than("ETH/USD", 0).is_empty());
        assert!(store.snapshot_keys_older_than("SOL/USD", 10).is_empty());
    }

    #[test]
    fn test_trade_for_evicted_window_is_late() {
        let store = store();
        upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();
        store.evict(&WindowKey::new("BTC/USD", 0)).unwrap();

        let err = upsert(&store, "BTC/USD", 99.0, 2_000).unwrap_err();
        assert_eq!(err.key, WindowKey::new("BTC/USD", 0));
        assert_eq!(err.sealed_through, 0);
    }

    #[test]
    fn test_opening_later_window_seals_earlier_indexes() {
        let store = store();
        upsert(&store, "BTC/USD", 100.0, 121_000).unwrap();

        // Window 1 never existed but lies behind the frontier.
        assert!(upsert(&store, "BTC/USD", 100.0, 61_000).is_err());
        // The current window still accepts trades.
        assert!(upsert(&store, "BTC/USD", 100.0, 122_000).is_ok());
        // Other symbols are unaffected.
        assert!(upsert(&store, "ETH/USD", 10.0, 1_000).is_ok());
    }

    #[test]
    fn test_idle_keys_skip_recently_touched() {
        let store = store();
        upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();

        // Touched since the (implicit) previous sweep: not idle yet.
        assert!(store.idle_keys(1_000_000, 5_000).is_empty());
        // No trade since the last sweep and past the grace period.
        assert_eq!(
            store.idle_keys(1_000_000, 5_000),
            vec![WindowKey::new("BTC/USD", 0)]
        );
    }

    #[test]
    fn test_idle_keys_respect_grace() {
        let store = store();
        upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();
        let _ = store.idle_keys(0, 5_000);

        assert!(store.idle_keys(64_999, 5_000).is_empty());
        assert_eq!(store.idle_keys(65_000, 5_000).len(), 1);
    }

    #[test]
    fn test_resident_keys_sorted() {
        let store = store();
        upsert(&store, "ETH/USD", 10.0, 61_000).unwrap();
        upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();

        assert_eq!(
            store.resident_keys(),
            vec![WindowKey::new("BTC/USD", 0), WindowKey::new("ETH/USD", 1)]
        );
    }

    #[test]
    fn test_concurrent_upserts_same_key() {
        let store = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        let price = 100.0 + f64::from(worker * 250 + i);
                        upsert(&store, "BTC/USD", price, 1_000).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let candle = store.get(&WindowKey::new("BTC/USD", 0)).unwrap();
        assert_eq!(candle.trade_count, 2_000);
        assert_relative_eq!(candle.high, 100.0 + 1_999.0);
        assert_relative_eq!(candle.low, 100.0);
    }

    #[test]
    fn test_sweep_idle_evicts_and_seals() {
        let store = store();
        upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();
        upsert(&store, "ETH/USD", 10.0, 1_000).unwrap();

        let mut emitted = Vec::new();
        assert!(store.sweep_idle_with(1_000_000, 5_000, |a| emitted.push(a.clone())).is_empty());

        // A trade between sweeps keeps its window open.
        upsert(&store, "ETH/USD", 11.0, 2_000).unwrap();
        let closed = store.sweep_idle_with(1_000_000, 5_000, |a| emitted.push(a.clone()));

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].symbol, "BTC/USD");
        assert_eq!(emitted, closed);
        assert!(upsert(&store, "BTC/USD", 99.0, 2_000).is_err());
        assert_eq!(store.get(&WindowKey::new("ETH/USD", 0)).unwrap().trade_count, 2);
    }

    #[test]
    fn test_racing_evictions_return_aggregate_once() {
        for _ in 0..100 {
            let store = Arc::new(store());
            upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();
            let key = WindowKey::new("BTC/USD", 0);
            let barrier = Arc::new(std::sync::Barrier::new(4));
            let calls = Arc::new(AtomicU64::new(0));

            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let (store, key, barrier, calls) =
                        (Arc::clone(&store), key.clone(), Arc::clone(&barrier), Arc::clone(&calls));
                    std::thread::spawn(move || {
                        barrier.wait();
                        store
                            .evict_with(&key, |_| {
                                calls.fetch_add(1, Ordering::SeqCst);
                            })
                            .is_some()
                    })
                })
                .collect();
            let winners = handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|won| *won)
                .count();

            assert_eq!(winners, 1);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(store.is_empty());
        }
    }

    #[test]
    fn test_trades_racing_idle_sweeps_are_never_lost() {
        let store = Arc::new(store());
        upsert(&store, "BTC/USD", 100.0, 1_000).unwrap();

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                (0..2_000)
                    .filter(|i| upsert(&store, "BTC/USD", 100.0 + f64::from(*i), 1_000).is_ok())
                    .count() as u64
            })
        };
        let sweeper = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                (0..2_000)
                    .flat_map(|_| store.sweep_idle_with(1_000_000, 0, |_| ()))
                    .map(|closed| closed.trade_count)
                    .sum::<u64>()
            })
        };

        let accepted = writer.join().unwrap() + 1;
        let mut folded = sweeper.join().unwrap();
        folded += store.evict(&WindowKey::new("BTC/USD", 0)).map_or(0, |a| a.trade_count);

        // Every accepted trade ends up in exactly one evicted aggregate.
        assert_eq!(folded, accepted);
    }

    #[test]
    fn test_shard_for_is_stable() {
        assert_eq!(shard_for("BTC/USD", 8), shard_for("BTC/USD", 8));
        assert!(shard_for("BTC/USD", 8) < 8);
        assert_eq!(shard_for("anything", 0), 0);
    }
}
