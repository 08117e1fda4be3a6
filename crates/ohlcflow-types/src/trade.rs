//! Trade representation and normalization.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::TradeError;

/// A single executed trade in canonical form.
///
/// Only constructible through validation, so every `Trade` the engine sees
/// has a non-empty symbol, a finite positive price and a finite
/// non-negative volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrade")]
pub struct Trade {
    symbol: String,
    price: f64,
    volume: f64,
    event_time: i64,
}

impl Trade {
    /// Creates a validated trade.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol is blank, the price is not a finite
    /// positive number, or the volume is not a finite non-negative number.
    pub fn new(
        symbol: impl Into<String>,
        price: f64,
        volume: f64,
        event_time: i64,
    ) -> Result<Self, TradeError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(TradeError::EmptySymbol);
        }
        if !price.is_finite() {
            return Err(TradeError::NonFinitePrice(price));
        }
        if price <= 0.0 {
            return Err(TradeError::NonPositivePrice(price));
        }
        if !volume.is_finite() || volume < 0.0 {
            return Err(TradeError::InvalidVolume(volume));
        }
        Ok(Self {
            symbol,
            price,
            volume,
            event_time,
        })
    }

    /// Returns the trading symbol (e.g. "BTC/USD").
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the execution price.
    #[must_use]
    pub const fn price(&self) -> f64 {
        self.price
    }

    /// Returns the traded volume.
    #[must_use]
    pub const fn volume(&self) -> f64 {
        self.volume
    }

    /// Returns the event time in epoch milliseconds.
    #[must_use]
    pub const fn event_time(&self) -> i64 {
        self.event_time
    }

    /// Returns the event time as a UTC datetime, if representable.
    #[must_use]
    pub fn event_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.event_time).single()
    }
}

impl TryFrom<RawTrade> for Trade {
    type Error = TradeError;

    fn try_from(raw: RawTrade) -> Result<Self, Self::Error> {
        raw.normalize()
    }
}

/// A trade record as delivered by an upstream producer, before validation.
///
/// Every field is optional and accepts the spellings used by the exchange
/// feeds (`product_id` or `symbol`, `qty` or `volume`, `timestamp`, `time`
/// or `event_time`). Prices and volumes may arrive as JSON numbers or
/// numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    /// Trading symbol.
    #[serde(default, alias = "product_id")]
    pub symbol: Option<String>,
    /// Execution price.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub price: Option<f64>,
    /// Traded volume.
    #[serde(default, alias = "qty", deserialize_with = "lenient_f64")]
    pub volume: Option<f64>,
    /// Event time.
    #[serde(default, alias = "timestamp", alias = "time")]
    pub event_time: Option<RawTimestamp>,
}

impl RawTrade {
    /// Creates a raw trade with every field present.
    #[must_use]
    pub fn new(symbol: impl Into<String>, price: f64, volume: f64, event_time_ms: i64) -> Self {
        Self {
            symbol: Some(symbol.into()),
            price: Some(price),
            volume: Some(volume),
            event_time: Some(RawTimestamp::Millis(event_time_ms)),
        }
    }

    /// Validates and shapes the record into a canonical [`Trade`].
    ///
    /// # Errors
    ///
    /// Returns an error if a field is missing or fails validation.
    pub fn normalize(self) -> Result<Trade, TradeError> {
        let symbol = self.symbol.ok_or(TradeError::MissingField("symbol"))?;
        let price = self.price.ok_or(TradeError::MissingField("price"))?;
        let volume = self.volume.ok_or(TradeError::MissingField("volume"))?;
        let event_time = self
            .event_time
            .ok_or(TradeError::MissingField("event_time"))?
            .to_millis()?;
        Trade::new(symbol, price, volume, event_time)
    }
}

/// Timestamp as found in upstream payloads.
///
/// Integers are epoch milliseconds, fractional numbers are epoch seconds
/// (the REST trade history format) and strings are either RFC 3339 or
/// integer milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Epoch milliseconds.
    Millis(i64),
    /// Epoch seconds with fractional part.
    Seconds(f64),
    /// RFC 3339 text or stringified milliseconds.
    Text(String),
}

impl RawTimestamp {
    /// Converts the timestamp to epoch milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is non-finite or unparseable.
    pub fn to_millis(&self) -> Result<i64, TradeError> {
        match self {
            Self::Millis(ms) => Ok(*ms),
            Self::Seconds(secs) => {
                if secs.is_finite() {
                    Ok((secs * 1000.0).floor() as i64)
                } else {
                    Err(TradeError::InvalidTimestamp(secs.to_string()))
                }
            }
            Self::Text(text) => text.trim().parse::<i64>().or_else(|_| {
                DateTime::parse_from_rfc3339(text.trim())
                    .map(|dt| dt.timestamp_millis())
                    .map_err(|_| TradeError::InvalidTimestamp(text.clone()))
            }),
        }
    }
}

/// Accepts a JSON number, a numeric string, or null.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match Option::<NumberOrText>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
