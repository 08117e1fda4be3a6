//! Trade-to-window key resolution.

use ohlcflow_types::{ConfigError, Trade, WindowKey, WindowSpec};

/// Maps trades to their tumbling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowResolver {
    spec: WindowSpec,
}

impl WindowResolver {
    /// Creates a resolver for the given window duration.
    #[must_use]
    pub const fn new(spec: WindowSpec) -> Self {
        Self { spec }
    }

    /// Creates a resolver from a duration in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration is not strictly positive.
    pub fn from_millis(duration_ms: i64) -> Result<Self, ConfigError> {
        WindowSpec::from_millis(duration_ms).map(Self::new)
    }

    /// Returns the window duration.
    #[must_use]
    pub const fn spec(&self) -> WindowSpec {
        self.spec
    }

    /// Returns the key of the window containing the trade.
    #[must_use]
    pub fn resolve(&self, trade: &Trade) -> WindowKey {
        WindowKey::new(trade.symbol(), self.index_of(trade.event_time()))
    }

    /// Returns `floor(event_time / duration)`, also for negative times.
    #[must_use]
    pub const fn index_of(&self, event_time: i64) -> i64 {
        event_time.div_euclid(self.spec.duration_ms())
    }

    /// Returns `(window_start, window_end)` of the given window index.
    #[must_use]
    pub const fn bounds(&self, window_index: i64) -> (i64, i64) {
        let duration = self.spec.duration_ms();
        let start = window_index.saturating_mul(duration);
        (start, start.saturating_add(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> WindowResolver {
        WindowResolver::from_millis(60_000).unwrap()
    }

    #[test]
    fn test_resolve() {
        let trade = Trade::new("BTC/USD", 100.0, 1.0, 70_000).unwrap();
        assert_eq!(resolver().resolve(&trade), WindowKey::new("BTC/USD", 1));
    }

    #[test]
    fn test_index_boundaries() {
        let r = resolver();
        assert_eq!(r.index_of(0), 0);
        assert_eq!(r.index_of(59_999), 0);
        assert_eq!(r.index_of(60_000), 1);
        assert_eq!(r.index_of(-1), -1);
    }

    #[test]
    fn test_bounds() {
        assert_eq!(resolver().bounds(2), (120_000, 180_000));
        assert_eq!(resolver().bounds(-1), (-60_000, 0));
    }

    #[test]
    fn test_rejects_zero_duration() {
        assert!(WindowResolver::from_millis(0).is_err());
    }
}
