//! Run command implementation.
//!
//! Reads newline-delimited JSON trades from a file or stdin, aggregates them
//! and writes candle records to the configured sink.

use anyhow::{Context, Result};
use futures::StreamExt;
use ohlcflow_lib::prelude::*;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{info, warn};

use super::shutdown_engine;
use crate::output::open_sink;
use crate::{EngineArgs, OutputArgs};

/// Aggregate trades until end of input or Ctrl-C.
pub(crate) async fn run(
    symbols: Vec<String>,
    input: Option<PathBuf>,
    output: &OutputArgs,
    engine: &EngineArgs,
    quiet: bool,
) -> Result<()> {
    let config = engine.config(symbols);
    let sink = open_sink(output).await?;
    let handle = Engine::start(config, sink).context("Failed to start engine")?;

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &input {
        Some(path) => Box::new(BufReader::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let trades = ndjson_trades(reader);
    tokio::pin!(trades);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut failure = None;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted, flushing open windows");
                break;
            }
            next = trades.next() => match next {
                Some(Ok(raw)) => {
                    if let Err(e) = handle.submit_raw(raw).await {
                        failure = Some(anyhow::Error::new(e).context("Engine stopped accepting trades"));
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(error = %e, "input read failed, stopping");
                    break;
                }
                None => break,
            },
        }
    }

    let report = shutdown_engine(handle, failure).await?;

    if !quiet {
        eprintln!(
            "Processed {} in {:.2?} ({:.0} trades/s)",
            report.stats,
            report.elapsed,
            report.trades_per_sec()
        );
        if let Some(path) = &output.output {
            eprintln!("Output written to: {}", path.display());
        }
    }

    Ok(())
}
