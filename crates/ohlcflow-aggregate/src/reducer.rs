//! The candle fold.

use ohlcflow_types::Trade;

use crate::{CandleAggregate, WindowResolver};

/// Folds one trade into an aggregate.
///
/// With no existing aggregate, opens a new candle whose bounds come from the
/// trade's window. Otherwise extends high/low, moves close, adds volume and
/// bumps the trade count; `open` is never touched.
///
/// The caller guarantees that `existing`, if present, belongs to the same
/// window as `trade`.
#[must_use]
pub fn reduce(
    existing: Option<CandleAggregate>,
    trade: &Trade,
    resolver: &WindowResolver,
) -> CandleAggregate {
    let price = trade.price();

    match existing {
        Some(mut candle) => {
            debug_assert_eq!(candle.symbol, trade.symbol());
            debug_assert_eq!(candle.window_index, resolver.index_of(trade.event_time()));
            candle.high = candle.high.max(price);
            candle.low = candle.low.min(price);
            candle.close = price;
            candle.volume += trade.volume();
            candle.trade_count += 1;
            candle
        }
        None => {
            let window_index = resolver.index_of(trade.event_time());
            let (window_start, window_end) = resolver.bounds(window_index);
            CandleAggregate {
                symbol: trade.symbol().to_string(),
                window_index,
                open: price,
                high: price,
                low: price,
                close: price,
                volume: trade.volume(),
                trade_count: 1,
                window_start,
                window_end,
            }
        }
    }
}
