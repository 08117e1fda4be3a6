//! Engine runtime: worker pool, idle sweep and sink drain.
//!
//! Trades are routed to a fixed worker by symbol hash, so each symbol is
//! folded serially. A timer task runs the idle sweep; a drain task moves
//! candle records from the emission queue into the sink.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ohlcflow_aggregate::{
    CandleAggregate, Clock, CloseReason, EmissionQueue, Emitter, SystemClock, WindowLifecycle,
    WindowResolver, WindowStore, shard_for,
};
use ohlcflow_sink::Sink;
use ohlcflow_types::{RawTrade, Trade, WindowKey};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::{EngineConfig, EngineError, EngineStats, StatsSnapshot};

#[derive(Debug)]
enum Command {
    Trade(Trade),
    Barrier(oneshot::Sender<()>),
}

/// What happened to a submitted trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Handed to its worker.
    Queued,
    /// Rejected by normalization.
    Malformed,
    /// The symbol is not in the configured set.
    UnknownSymbol,
}

/// Summary returned by [`EngineHandle::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineReport {
    /// Final counter values.
    pub stats: StatsSnapshot,
    /// Time between start and the end of shutdown.
    pub elapsed: Duration,
}

impl EngineReport {
    /// Accepted trades per second of engine lifetime.
    #[must_use]
    pub fn trades_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.trades_accepted as f64 / secs
        } else {
            0.0
        }
    }
}

/// Entry point for starting the aggregation engine.
#[derive(Debug, Clone, Copy)]
pub struct Engine;

impl Engine {
    /// Starts the engine with the system clock.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn start<S>(config: EngineConfig, sink: S) -> Result<EngineHandle, EngineError>
    where
        S: Sink + 'static,
    {
        Self::start_with_clock(config, sink, Arc::new(SystemClock))
    }

    /// Starts the engine with a custom clock for the idle sweep.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn start_with_clock<S>(
        config: EngineConfig,
        sink: S,
        clock: Arc<dyn Clock>,
    ) -> Result<EngineHandle, EngineError>
    where
        S: Sink + 'static,
    {
        config.validate()?;

        let store = Arc::new(WindowStore::with_shards(
            WindowResolver::new(config.window),
            config.shards,
        ));
        let (emitter, queue) = Emitter::bounded(config.queue_capacity, config.mode);
        let lifecycle = WindowLifecycle::new(store, emitter, clock, config.idle_grace_ms());
        let stats = Arc::new(EngineStats::default());

        let drain_task = tokio::spawn(drain(queue, sink, Arc::clone(&stats)));

        let mut workers = Vec::with_capacity(config.workers);
        let mut worker_tasks = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            let (tx, rx) = mpsc::channel(config.input_capacity);
            worker_tasks.push(tokio::spawn(run_worker(
                id,
                rx,
                lifecycle.clone(),
                Arc::clone(&stats),
            )));
            workers.push(tx);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sweep_task = config.idle_sweep.then(|| {
            tokio::spawn(run_sweep(
                config.sweep_interval(),
                lifecycle.clone(),
                Arc::clone(&stats),
                shutdown_rx,
            ))
        });

        info!(
            window = %config.window,
            symbols = config.symbols.len(),
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            mode = %config.mode,
            idle_grace_ms = config.idle_grace_ms(),
            idle_sweep = config.idle_sweep,
            "engine started"
        );

        Ok(EngineHandle {
            lifecycle,
            stats,
            symbols: config.symbols.into_iter().collect(),
            workers,
            worker_tasks,
            sweep_task,
            shutdown_tx,
            drain_task,
            started: Instant::now(),
        })
    }
}

/// Handle to a running engine.
#[derive(Debug)]
pub struct EngineHandle {
    lifecycle: WindowLifecycle,
    stats: Arc<EngineStats>,
    symbols: HashSet<String>,
    workers: Vec<mpsc::Sender<Command>>,
    worker_tasks: Vec<JoinHandle<()>>,
    sweep_task: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    drain_task: JoinHandle<()>,
    started: Instant,
}

impl EngineHandle {
    /// Routes a trade to the worker owning its symbol.
    ///
    /// Waits while that worker's input queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Closed`] if the worker has stopped.
    pub async fn submit(&self, trade: Trade) -> Result<Admission, EngineError> {
        if !self.symbols.contains(trade.symbol()) {
            self.stats.trade_unknown_symbol();
            warn!(symbol = trade.symbol(), "dropping trade for unconfigured symbol");
            return Ok(Admission::UnknownSymbol);
        }

        let worker = shard_for(trade.symbol(), self.workers.len());
        self.workers[worker]
            .send(Command::Trade(trade))
            .await
            .map_err(|_| EngineError::Closed)?;
        Ok(Admission::Queued)
    }

    /// Normalizes a raw record and submits it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Closed`] if the worker has stopped.
    pub async fn submit_raw(&self, raw: RawTrade) -> Result<Admission, EngineError> {
        match raw.normalize() {
            Ok(trade) => self.submit(trade).await,
            Err(e) => {
                self.stats.trade_malformed();
                warn!(error = %e, "dropping malformed trade");
                Ok(Admission::Malformed)
            }
        }
    }

    /// Waits until every trade submitted so far has been folded.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Closed`] if a worker has stopped.
    pub async fn settle(&self) -> Result<(), EngineError> {
        let mut pending = Vec::with_capacity(self.workers.len());
        for worker in &self.workers {
            let (tx, rx) = oneshot::channel();
            worker
                .send(Command::Barrier(tx))
                .await
                .map_err(|_| EngineError::Closed)?;
            pending.push(rx);
        }
        for rx in pending {
            rx.await.map_err(|_| EngineError::Closed)?;
        }
        Ok(())
    }

    /// Runs one idle sweep immediately and returns the number of windows closed.
    pub fn sweep_now(&self) -> usize {
        let closed = self.lifecycle.sweep();
        self.stats.windows_closed(CloseReason::Idle, closed);
        closed
    }

    /// Returns the current aggregate of an open window.
    #[must_use]
    pub fn current(&self, key: &WindowKey) -> Option<CandleAggregate> {
        self.lifecycle.store().get(key)
    }

    /// Returns the number of open windows.
    #[must_use]
    pub fn open_windows(&self) -> usize {
        self.lifecycle.store().len()
    }

    /// Returns the current counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stops the engine.
    ///
    /// Stops intake, lets the workers finish their queues, stops the sweep,
    /// closes every open window, drains the emission queue into the sink and
    /// flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if a background task panicked.
    pub async fn shutdown(self) -> Result<EngineReport, EngineError> {
        let Self {
            lifecycle,
            stats,
            workers,
            worker_tasks,
            sweep_task,
            shutdown_tx,
            drain_task,
            started,
            ..
        } = self;

        drop(workers);
        for task in worker_tasks {
            task.await?;
        }

        let _ = shutdown_tx.send(true);
        if let Some(task) = sweep_task {
            task.await?;
        }

        let flushed = lifecycle.flush_all();
        stats.windows_closed(CloseReason::Shutdown, flushed);
        debug!(flushed, "flushed open windows");

        // Last emitter goes away here, which ends the drain once it is empty.
        drop(lifecycle);
        drain_task.await?;

        let report = EngineReport {
            stats: stats.snapshot(),
            elapsed: started.elapsed(),
        };
        info!(stats = %report.stats, "engine stopped");
        Ok(report)
    }
}

async fn run_worker(
    id: usize,
    mut rx: mpsc::Receiver<Command>,
    lifecycle: WindowLifecycle,
    stats: Arc<EngineStats>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            Command::Trade(trade) => match lifecycle.on_trade(&trade) {
                Ok(applied) => {
                    stats.trade_accepted();
                    stats.windows_closed(CloseReason::Advance, applied.advanced);
                }
                Err(late) => {
                    stats.trade_late();
                    warn!(
                        worker = id,
                        error = %late,
                        event_time = trade.event_time(),
                        price = trade.price(),
                        "dropping late trade"
                    );
                }
            },
            Command::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!(worker = id, "worker stopped");
}

async fn run_sweep(
    period: Duration,
    lifecycle: WindowLifecycle,
    stats: Arc<EngineStats>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let closed = lifecycle.sweep();
                stats.windows_closed(CloseReason::Idle, closed);
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("idle sweep stopped");
}

async fn drain<S: Sink>(mut queue: EmissionQueue, mut sink: S, stats: Arc<EngineStats>) {
    while let Some(record) = queue.recv().await {
        stats.set_records_dropped(queue.dropped());
        match sink.write(&record).await {
            Ok(()) => stats.record_written(),
            Err(e) => {
                stats.sink_failure();
                error!(
                    symbol = %record.symbol,
                    window_end = record.window_end,
                    is_final = record.is_final,
                    error = %e,
                    "dropping candle record after sink failure"
                );
            }
        }
    }
    stats.set_records_dropped(queue.dropped());

    if let Err(e) = sink.flush().await {
        stats.sink_failure();
        error!(error = %e, "sink flush failed");
    }
}
