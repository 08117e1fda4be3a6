//! Tumbling window definitions.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ConfigError;

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Duration of a tumbling window.
///
/// Always strictly positive; construction fails otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct WindowSpec {
    duration_ms: i64,
}

impl WindowSpec {
    /// One-minute windows.
    pub const MINUTE: Self = Self {
        duration_ms: MINUTE_MS,
    };

    /// Creates a window spec from a duration in milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration is not strictly positive.
    pub fn from_millis(duration_ms: i64) -> Result<Self, ConfigError> {
        if duration_ms <= 0 {
            return Err(ConfigError::NonPositiveWindow(duration_ms));
        }
        Ok(Self { duration_ms })
    }

    /// Creates a window spec from a duration in seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the duration is not strictly positive.
    pub fn from_secs(seconds: i64) -> Result<Self, ConfigError> {
        Self::from_millis(seconds.saturating_mul(SECOND_MS))
    }

    /// Returns the window duration in milliseconds.
    #[must_use]
    pub const fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    /// Returns the window duration as a std duration.
    #[must_use]
    pub const fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.duration_ms as u64)
    }
}

impl TryFrom<i64> for WindowSpec {
    type Error = ConfigError;

    fn try_from(duration_ms: i64) -> Result<Self, Self::Error> {
        Self::from_millis(duration_ms)
    }
}

impl From<WindowSpec> for i64 {
    fn from(spec: WindowSpec) -> Self {
        spec.duration_ms
    }
}

impl std::fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ms = self.duration_ms;
        for (unit, suffix) in [(DAY_MS, "d"), (HOUR_MS, "h"), (MINUTE_MS, "m"), (SECOND_MS, "s")] {
            if ms % unit == 0 {
                return write!(f, "{}{suffix}", ms / unit);
            }
        }
        write!(f, "{ms}ms")
    }
}

impl FromStr for WindowSpec {
    type Err = WindowSpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_lowercase();
        let err = || WindowSpecParseError(s.to_string());

        // Accept both "5m" and "m5" spellings.
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (amount, unit) = if split == 0 {
            let digits = text
                .find(|c: char| c.is_ascii_digit())
                .ok_or_else(err)?;
            (&text[digits..], &text[..digits])
        } else {
            (&text[..split], &text[split..])
        };

        let amount: i64 = amount.parse().map_err(|_| err())?;
        let unit_ms = match unit {
            "ms" => 1,
            "" | "s" | "sec" | "secs" | "second" | "seconds" => SECOND_MS,
            "m" | "min" | "mins" | "minute" | "minutes" => MINUTE_MS,
            "h" | "hr" | "hour" | "hours" => HOUR_MS,
            "d" | "day" | "days" => DAY_MS,
            _ => return Err(err()),
        };

        Self::from_millis(amount.checked_mul(unit_ms).ok_or_else(err)?).map_err(|_| err())
    }
}

/// Error returned when parsing an invalid window duration string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpecParseError(String);

impl std::fmt::Display for WindowSpecParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid window '{}', expected a positive duration such as 500ms, 10s, 1m, 4h, 1d",
            self.0
        )
    }
}

impl std::error::Error for WindowSpecParseError {}

/// Identifies one tumbling window of one symbol.
///
/// Keys of the same symbol are totally ordered by `window_index`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[display("{symbol}#{window_index}")]
pub struct WindowKey {
    /// Trading symbol.
    pub symbol: String,
    /// `floor(event_time / window_duration_ms)`.
    pub window_index: i64,
}

impl WindowKey {
    /// Creates a new window key.
    #[must_use]
    pub fn new(symbol: impl Into<String>, window_index: i64) -> Self {
        Self {
            symbol: symbol.into(),
            window_index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_spec_rejects_non_positive() {
        assert_eq!(
            WindowSpec::from_millis(0),
            Err(ConfigError::NonPositiveWindow(0))
        );
        assert!(WindowSpec::from_secs(-5).is_err());
    }

    #[test]
    fn test_window_spec_parse() {
        assert_eq!("1m".parse::<WindowSpec>().unwrap(), WindowSpec::MINUTE);
        assert_eq!("m1".parse::<WindowSpec>().unwrap(), WindowSpec::MINUTE);
        assert_eq!("60".parse::<WindowSpec>().unwrap(), WindowSpec::MINUTE);
        assert_eq!(
            "500ms".parse::<WindowSpec>().unwrap().duration_ms(),
            500
        );
        assert_eq!(
            "4H".parse::<WindowSpec>().unwrap().duration_ms(),
            4 * HOUR_MS
        );
        assert!("0s".parse::<WindowSpec>().is_err());
        assert!("fortnight".parse::<WindowSpec>().is_err());
        assert!("".parse::<WindowSpec>().is_err());
    }

    #[test]
    fn test_window_spec_display() {
        assert_eq!(WindowSpec::MINUTE.to_string(), "1m");
        assert_eq!(WindowSpec::from_millis(90_000).unwrap().to_string(), "90s");
        assert_eq!(WindowSpec::from_millis(1_500).unwrap().to_string(), "1500ms");
        assert_eq!(WindowSpec::from_millis(DAY_MS).unwrap().to_string(), "1d");
    }

    #[test]
    fn test_window_key_ordering_and_display() {
        let a = WindowKey::new("BTC/USD", 3);
        let b = WindowKey::new("BTC/USD", 10);
        assert!(a < b);
        assert_eq!(a.to_string(), "BTC/USD#3");
    }
}
