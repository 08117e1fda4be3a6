//! Engine configuration.

use std::collections::HashSet;
use std::time::Duration;

use ohlcflow_aggregate::{EmissionMode, WindowStore};
use ohlcflow_types::{ConfigError, WindowSpec};

/// Runtime configuration of an [`Engine`](crate::Engine).
///
/// Optional knobs left unset are derived from the window duration; see
/// [`idle_grace_ms`](Self::idle_grace_ms) and
/// [`sweep_interval`](Self::sweep_interval).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Tumbling window duration.
    pub window: WindowSpec,
    /// Symbols the engine accepts.
    pub symbols: Vec<String>,
    /// Grace after a window's end before the idle sweep may close it.
    pub idle_grace_ms: Option<i64>,
    /// Period of the idle sweep.
    pub sweep_interval: Option<Duration>,
    /// Whether the periodic idle sweep runs at all.
    pub idle_sweep: bool,
    /// Number of aggregation workers.
    pub workers: usize,
    /// Pending trades per worker before submitters wait.
    pub input_capacity: usize,
    /// Pending candle records before the oldest is dropped.
    pub queue_capacity: usize,
    /// Number of store shards.
    pub shards: usize,
    /// Which updates reach the sink.
    pub mode: EmissionMode,
}

impl EngineConfig {
    /// Default worker count.
    pub const DEFAULT_WORKERS: usize = 4;
    /// Default per-worker input capacity.
    pub const DEFAULT_INPUT_CAPACITY: usize = 1024;
    /// Default emission queue capacity.
    pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;
    /// Largest accepted worker count, input capacity, queue capacity or shard count.
    pub const MAX_CAPACITY: usize = 1 << 20;
    /// Upper bound of the derived sweep interval.
    pub const MAX_DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

    /// Creates a configuration with default knobs.
    pub fn new<I, S>(window: WindowSpec, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            window,
            symbols: symbols.into_iter().map(Into::into).collect(),
            idle_grace_ms: None,
            sweep_interval: None,
            idle_sweep: true,
            workers: Self::DEFAULT_WORKERS,
            input_capacity: Self::DEFAULT_INPUT_CAPACITY,
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            shards: WindowStore::DEFAULT_SHARDS,
            mode: EmissionMode::default(),
        }
    }

    /// Sets the idle grace period.
    #[must_use]
    pub const fn with_idle_grace_ms(mut self, grace_ms: i64) -> Self {
        self.idle_grace_ms = Some(grace_ms);
        self
    }

    /// Sets the idle sweep period.
    #[must_use]
    pub const fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Disables the periodic idle sweep.
    ///
    /// Windows then close only on advance, on [`sweep_now`] or at shutdown.
    /// Used for historical replays, where wall-clock idleness means nothing.
    ///
    /// [`sweep_now`]: crate::EngineHandle::sweep_now
    #[must_use]
    pub const fn without_idle_sweep(mut self) -> Self {
        self.idle_sweep = false;
        self
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the per-worker input capacity.
    #[must_use]
    pub const fn with_input_capacity(mut self, capacity: usize) -> Self {
        self.input_capacity = capacity;
        self
    }

    /// Sets the emission queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the store shard count.
    #[must_use]
    pub const fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Sets the emission mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: EmissionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the idle grace, defaulting to a tenth of the window.
    #[must_use]
    pub fn idle_grace_ms(&self) -> i64 {
        self.idle_grace_ms
            .unwrap_or(self.window.duration_ms() / 10)
    }

    /// Returns the sweep period, defaulting to a quarter of the window capped
    /// at one second, and never below one millisecond.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or_else(|| {
            (self.window.as_duration() / 4)
                .min(Self::MAX_DEFAULT_SWEEP_INTERVAL)
                .max(Duration::from_millis(1))
        })
    }

    /// Checks every knob.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.duration_ms() <= 0 {
            return Err(ConfigError::NonPositiveWindow(self.window.duration_ms()));
        }
        let grace = self.idle_grace_ms();
        if grace < 0 {
            return Err(ConfigError::NegativeGrace(grace));
        }
        if self.sweep_interval().is_zero() {
            return Err(ConfigError::ZeroSweepInterval);
        }
        if self.symbols.is_empty() {
            return Err(ConfigError::EmptySymbols);
        }
        let mut seen = HashSet::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            if symbol.trim().is_empty() {
                return Err(ConfigError::BlankSymbol);
            }
            if !seen.insert(symbol.as_str()) {
                return Err(ConfigError::DuplicateSymbol(symbol.clone()));
            }
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.input_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("input"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("emission queue"));
        }
        if self.shards == 0 {
            return Err(ConfigError::ZeroCapacity("shard"));
        }
        for (name, requested) in [
            ("worker", self.workers),
            ("input", self.input_capacity),
            ("emission queue", self.queue_capacity),
            ("shard", self.shards),
        ] {
            if requested > Self::MAX_CAPACITY {
                return Err(ConfigError::CapacityTooLarge {
                    name,
                    requested,
                    max: Self::MAX_CAPACITY,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::new(WindowSpec::MINUTE, ["BTC/USD", "ETH/USD"])
    }

    #[test]
    fn test_defaults() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.idle_grace_ms(), 6_000);
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
        assert_eq!(config.workers, 4);
        assert_eq!(config.mode, EmissionMode::Continuous);
        assert!(config.idle_sweep);
    }

    #[test]
    fn test_short_window_sweeps_faster() {
        let config = EngineConfig::new(WindowSpec::from_millis(200).unwrap(), ["X"]);
        assert_eq!(config.sweep_interval(), Duration::from_millis(50));
        assert_eq!(config.idle_grace_ms(), 20);

        let tiny = EngineConfig::new(WindowSpec::from_millis(2).unwrap(), ["X"]);
        assert_eq!(tiny.sweep_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_validate_rejects_bad_knobs() {
        assert_eq!(
            EngineConfig::new(WindowSpec::MINUTE, Vec::<String>::new()).validate(),
            Err(ConfigError::EmptySymbols)
        );
        assert_eq!(
            EngineConfig::new(WindowSpec::MINUTE, ["A", "A"]).validate(),
            Err(ConfigError::DuplicateSymbol("A".to_string()))
        );
        assert_eq!(
            EngineConfig::new(WindowSpec::MINUTE, [" "]).validate(),
            Err(ConfigError::BlankSymbol)
        );
        assert_eq!(
            config().with_idle_grace_ms(-1).validate(),
            Err(ConfigError::NegativeGrace(-1))
        );
        assert_eq!(
            config().with_workers(0).validate(),
            Err(ConfigError::ZeroWorkers)
        );
        assert_eq!(
            config().with_queue_capacity(0).validate(),
            Err(ConfigError::ZeroCapacity("emission queue"))
        );
        assert_eq!(
            config().with_sweep_interval(Duration::ZERO).validate(),
            Err(ConfigError::ZeroSweepInterval)
        );
        assert_eq!(
            config().with_queue_capacity(usize::MAX).validate(),
            Err(ConfigError::CapacityTooLarge {
                name: "emission queue",
                requested: usize::MAX,
                max: EngineConfig::MAX_CAPACITY,
            })
        );
        assert!(matches!(
            config().with_input_capacity(EngineConfig::MAX_CAPACITY + 1).validate(),
            Err(ConfigError::CapacityTooLarge { name: "input", .. })
        ));
        assert!(config().with_queue_capacity(EngineConfig::MAX_CAPACITY).validate().is_ok());
        assert!(config().with_queue_capacity(3).validate().is_ok());
    }
}
