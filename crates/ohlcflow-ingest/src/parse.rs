//! Exchange payload decoding.
//!
//! Two payload families are understood:
//!
//! - REST trade history pages: `{"error": [], "result": {"<pair>": [[price,
//!   volume, time_sec, side, type, misc, id], ...], "last": "<ns cursor>"}}`
//! - websocket v2 messages: `{"channel": "trade", "data": [{"symbol", "price",
//!   "qty", "timestamp", ...}]}`; heartbeats, status messages and
//!   subscription acknowledgements carry no trades.

use ohlcflow_types::{RawTimestamp, RawTrade};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::IngestError;

/// One page of historical trades.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradePage {
    /// Trades in the page, oldest first.
    pub trades: Vec<RawTrade>,
    /// Cursor for the next page in epoch nanoseconds.
    pub last_ns: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<Map<String, Value>>,
}

/// Parses a REST `Trades` response body.
///
/// Rows are tagged with `pair` as their symbol. Rows with unreadable price or
/// volume are kept with the field missing so normalization can reject them.
///
/// # Errors
///
/// Returns an error if the body is not JSON, the exchange reported an error,
/// or the result section is missing.
pub fn parse_trades_page(json: &str, pair: &str) -> Result<TradePage, IngestError> {
    let response: RestResponse = serde_json::from_str(json)?;
    if !response.error.is_empty() {
        return Err(IngestError::Api(response.error));
    }
    let result = response
        .result
        .ok_or_else(|| IngestError::Format("missing result".to_string()))?;

    let last_ns = match result.get("last") {
        Some(Value::String(text)) => Some(
            text.parse::<i64>()
                .map_err(|_| IngestError::Format(format!("invalid cursor: {text}")))?,
        ),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    };

    let rows = result
        .iter()
        .find(|(key, _)| key.as_str() != "last")
        .map(|(_, rows)| rows);
    let trades = match rows {
        Some(Value::Array(rows)) => rows.iter().filter_map(|row| parse_rest_row(row, pair)).collect(),
        Some(_) => return Err(IngestError::Format("trade rows are not an array".to_string())),
        None => Vec::new(),
    };

    Ok(TradePage { trades, last_ns })
}

fn parse_rest_row(row: &Value, pair: &str) -> Option<RawTrade> {
    let fields = row.as_array()?;
    Some(RawTrade {
        symbol: Some(pair.to_string()),
        price: fields.first().and_then(number),
        volume: fields.get(1).and_then(number),
        event_time: fields.get(2).and_then(number).map(RawTimestamp::Seconds),
    })
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct WsMessage {
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Vec<RawTrade>,
}

/// Parses a websocket v2 message into its trades.
///
/// # Errors
///
/// Returns an error if the message is not valid JSON.
pub fn parse_ws_message(json: &str) -> Result<Vec<RawTrade>, IngestError> {
    ws_trades(serde_json::from_str(json)?)
}

fn ws_trades(value: Value) -> Result<Vec<RawTrade>, IngestError> {
    let message: WsMessage = serde_json::from_value(value)?;
    match message.channel.as_deref() {
        Some("trade") => Ok(message.data),
        _ => Ok(Vec::new()),
    }
}

/// Parses one line of a trade stream.
///
/// The line is either a websocket message (it has a `channel` or `method`
/// field) or a single canonical trade object.
///
/// # Errors
///
/// Returns an error if the line is not a JSON object of either kind.
pub fn parse_line(line: &str) -> Result<Vec<RawTrade>, IngestError> {
    let value: Value = serde_json::from_str(line)?;
    let Value::Object(object) = &value else {
        return Err(IngestError::Format("expected a JSON object".to_string()));
    };

    if object.contains_key("channel") || object.contains_key("method") {
        ws_trades(value)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}
