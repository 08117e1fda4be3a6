//! Benchmark utilities for ohlcflow.

use ohlcflow_lib::{RawTrade, Trade};

/// Shape of a synthetic trade stream.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Number of distinct symbols.
    pub symbols: usize,
    /// Trades per symbol.
    pub trades_per_symbol: usize,
    /// Event-time step between consecutive trades of one symbol, in ms.
    pub step_ms: i64,
}

impl WorkloadConfig {
    /// Total trades generated.
    pub const fn total_trades(&self) -> usize {
        self.symbols * self.trades_per_symbol
    }

    /// Symbol names `SYM0/USD`, `SYM1/USD`, ...
    pub fn symbol_names(&self) -> Vec<String> {
        (0..self.symbols).map(|i| format!("SYM{i}/USD")).collect()
    }
}

/// Generates validated trades, symbols interleaved round-robin.
///
/// Prices follow a deterministic zig-zag so that highs and lows move.
pub fn generate_trades(config: &WorkloadConfig) -> Vec<Trade> {
    generate_raw(config)
        .into_iter()
        .filter_map(|raw| raw.normalize().ok())
        .collect()
}

/// Generates raw trades, symbols interleaved round-robin.
pub fn generate_raw(config: &WorkloadConfig) -> Vec<RawTrade> {
    let names = config.symbol_names();
    let mut trades = Vec::with_capacity(config.total_trades());
    for step in 0..config.trades_per_symbol {
        let t = step as i64 * config.step_ms;
        let offset = (step % 17) as f64 - 8.0;
        for (i, name) in names.iter().enumerate() {
            let price = 100.0 * (i + 1) as f64 + offset;
            trades.push(RawTrade::new(name.clone(), price, 0.5, t));
        }
    }
    trades
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_trades() {
        let config = WorkloadConfig {
            symbols: 3,
            trades_per_symbol: 10,
            step_ms: 250,
        };
        let trades = generate_trades(&config);

        assert_eq!(trades.len(), 30);
        assert_eq!(trades[0].symbol(), "SYM0/USD");
        assert_eq!(trades[1].symbol(), "SYM1/USD");
        assert_eq!(trades[29].event_time(), 9 * 250);
    }
}
