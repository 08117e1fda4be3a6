//! Paginated historical backfill.

use futures::stream::{self, Stream};
use ohlcflow_types::{RawTrade, TimeRange};
use tracing::info;

use crate::{IngestError, KrakenClient, TradePage};

const NANOS_PER_MILLI: i64 = 1_000_000;

/// One fetched page of trades, restricted to the requested range.
#[derive(Debug, Clone, Default)]
pub struct TradeBatch {
    /// Trades inside the range, in delivery order.
    pub trades: Vec<RawTrade>,
    /// Cursor after this page in epoch milliseconds.
    pub cursor_ms: i64,
    /// 1-based page number.
    pub page: usize,
}

impl TradeBatch {
    /// Returns true if the batch is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    /// Returns the number of trades in the batch.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.trades.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Cursor {
    since_ns: i64,
    page: usize,
    done: bool,
}

/// Streams historical trades for `pair` within `range`, page by page.
///
/// The stream ends after the page whose cursor reaches `range.to_ms`, after
/// an empty page, or when the cursor stops advancing. A request error is
/// yielded once and ends the stream.
pub fn backfill_stream<'a>(
    client: &'a KrakenClient,
    pair: &'a str,
    range: TimeRange,
) -> impl Stream<Item = Result<TradeBatch, IngestError>> + 'a {
    let start = Cursor {
        since_ns: range.from_ms.saturating_mul(NANOS_PER_MILLI),
        page: 0,
        done: false,
    };

    stream::unfold(start, move |cursor| async move {
        if cursor.done {
            return None;
        }

        match client.fetch_trades_page(pair, cursor.since_ns).await {
            Ok(page) => {
                let (batch, next) = advance(cursor, page, &range);
                if next.done {
                    info!(pair, pages = next.page, "backfill complete");
                }
                Some((Ok(batch), next))
            }
            Err(e) => Some((
                Err(e),
                Cursor {
                    done: true,
                    ..cursor
                },
            )),
        }
    })
}

fn advance(cursor: Cursor, page: TradePage, range: &TimeRange) -> (TradeBatch, Cursor) {
    let since_ns = page.last_ns.unwrap_or(cursor.since_ns);
    let done = page.trades.is_empty()
        || since_ns <= cursor.since_ns
        || since_ns / NANOS_PER_MILLI >= range.to_ms;

    let trades = page
        .trades
        .into_iter()
        .filter(|trade| in_range(trade, range))
        .collect();

    let next = Cursor {
        since_ns,
        page: cursor.page + 1,
        done,
    };
    let batch = TradeBatch {
        trades,
        cursor_ms: since_ns / NANOS_PER_MILLI,
        page: next.page,
    };
    (batch, next)
}

/// Trades whose time cannot be read are kept so normalization can count them.
fn in_range(trade: &RawTrade, range: &TimeRange) -> bool {
    trade
        .event_time
        .as_ref()
        .and_then(|time| time.to_millis().ok())
        .is_none_or(|ms| range.contains(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientConfig;
    use futures::StreamExt;
    use ohlcflow_types::{Backoff, RawTimestamp};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn raw(seconds: f64) -> RawTrade {
        RawTrade {
            symbol: Some("XBT/USD".to_string()),
            price: Some(100.0),
            volume: Some(1.0),
            event_time: Some(RawTimestamp::Seconds(seconds)),
        }
    }

    fn range() -> TimeRange {
        TimeRange::new(1_000_000, 1_010_000).unwrap()
    }

    #[test]
    fn test_advance_filters_and_moves_cursor() {
        let cursor = Cursor {
            since_ns: 1_000_000 * NANOS_PER_MILLI,
            page: 0,
            done: false,
        };
        let page = TradePage {
            trades: vec![raw(999.5), raw(1000.0), raw(1005.0)],
            last_ns: Some(1_005_000 * NANOS_PER_MILLI),
        };

        let (batch, next) = advance(cursor, page, &range());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.cursor_ms, 1_005_000);
        assert_eq!(batch.page, 1);
        assert!(!next.done);
    }

    #[test]
    fn test_advance_stops_at_range_end() {
        let cursor = Cursor {
            since_ns: 1_005_000 * NANOS_PER_MILLI,
            page: 1,
            done: false,
        };
        let page = TradePage {
            trades: vec![raw(1008.0), raw(1012.0)],
            last_ns: Some(1_012_000 * NANOS_PER_MILLI),
        };

        let (batch, next) = advance(cursor, page, &range());
        assert_eq!(batch.len(), 1);
        assert!(next.done);
    }

    #[test]
    fn test_advance_stops_on_empty_or_stalled_page() {
        let cursor = Cursor {
            since_ns: 5,
            page: 0,
            done: false,
        };
        let (_, next) = advance(cursor, TradePage::default(), &range());
        assert!(next.done);

        let stalled = TradePage {
            trades: vec![raw(1001.0)],
            last_ns: Some(5),
        };
        let (_, next) = advance(cursor, stalled, &range());
        assert!(next.done);
    }

    fn page_body(since: &str) -> String {
        if since == "1000000000000000" {
            r#"{"error":[],"result":{"XXBTZUSD":[
                ["100.0","1.0",999.5,"b","m",""],
                ["101.0","1.0",1000.0,"b","m",""],
                ["102.0","1.0",1005.0,"s","l",""]
            ],"last":"1005000000000000"}}"#
                .to_string()
        } else {
            r#"{"error":[],"result":{"XXBTZUSD":[
                ["103.0","1.0",1008.0,"b","m",""],
                ["104.0","1.0",1012.0,"b","m",""]
            ],"last":"1012000000000000"}}"#
                .to_string()
        }
    }

    /// Serves canned trade pages keyed by the `since` query parameter.
    async fn serve_pages() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                }
                let request = String::from_utf8_lossy(&request);
                let since = request
                    .split(['?', '&', ' '])
                    .find_map(|part| part.strip_prefix("since="))
                    .unwrap_or_default()
                    .to_string();
                let body = page_body(&since);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_backfill_stream_pages_until_range_end() {
        let base_url = serve_pages().await;
        let config = ClientConfig::default()
            .with_base_url(base_url)
            .with_backoff(Backoff::none());
        let client = KrakenClient::new(config).unwrap();

        let batches: Vec<TradeBatch> = backfill_stream(&client, "XBT/USD", range())
            .map(Result::unwrap)
            .collect()
            .await;

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 1);

        let times: Vec<i64> = batches
            .iter()
            .flat_map(|batch| batch.trades.iter().cloned())
            .map(|raw| raw.normalize().unwrap().event_time())
            .collect();
        assert_eq!(times, vec![1_000_000, 1_005_000, 1_008_000]);
    }

    #[tokio::test]
    async fn test_backfill_stream_ends_on_error() {
        let config = ClientConfig::default()
            .with_base_url("http://127.0.0.1:9")
            .with_backoff(Backoff::none());
        let client = KrakenClient::new(config).unwrap();

        let results: Vec<_> = backfill_stream(&client, "XBT/USD", range()).collect().await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
