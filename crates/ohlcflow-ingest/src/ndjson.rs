//! Live trade feed from newline-delimited JSON.

use futures::stream::{self, Stream, StreamExt};
use ohlcflow_types::RawTrade;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::warn;

use crate::{IngestError, parse_line};

struct LineState<R> {
    lines: Lines<R>,
    line_no: u64,
}

/// Streams raw trades from newline-delimited JSON.
///
/// Each line holds a canonical trade object or a websocket message (see
/// [`parse_line`]). Blank lines are ignored; lines that fail to decode are
/// logged and skipped. A read error is yielded once and ends the stream.
pub fn ndjson_trades<R>(reader: R) -> impl Stream<Item = Result<RawTrade, IngestError>>
where
    R: AsyncBufRead + Unpin,
{
    let start = LineState {
        lines: reader.lines(),
        line_no: 0,
    };

    stream::unfold(Some(start), |state| async move {
        let mut state = state?;
        loop {
            match state.lines.next_line().await {
                Ok(Some(line)) => {
                    state.line_no += 1;
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_line(line) {
                        Ok(trades) => return Some((Ok(trades), Some(state))),
                        Err(e) => warn!(line = state.line_no, error = %e, "skipping undecodable line"),
                    }
                }
                Ok(None) => return None,
                Err(e) => return Some((Err(IngestError::from(e)), None)),
            }
        }
    })
    .flat_map(|result| match result {
        Ok(trades) => stream::iter(trades.into_iter().map(Ok)).left_stream(),
        Err(e) => stream::once(async move { Err(e) }).right_stream(),
    })
}
