//! Backfill command implementation.
//!
//! Pages through the exchange's historical trades for one pair and feeds
//! them through the engine. The idle sweep is disabled: windows close on
//! later trades and on the final flush, never on wall-clock time.

use anyhow::{Context, Result};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use ohlcflow_lib::prelude::*;
use std::time::Duration;

use super::shutdown_engine;
use crate::output::{format_ms, open_sink};
use crate::{EngineArgs, OutputArgs};

/// Backfill candles for `pair` over `[from, to)`.
pub(crate) async fn backfill(
    pair: &str,
    from: &str,
    to: &str,
    base_url: Option<&str>,
    output: &OutputArgs,
    engine: &EngineArgs,
    quiet: bool,
) -> Result<()> {
    let range = TimeRange::parse(from, to).context("Invalid time range")?;

    let mut client_config = ClientConfig::default();
    if let Some(url) = base_url {
        client_config = client_config.with_base_url(url);
    }
    let client = KrakenClient::new(client_config)?;

    let config = engine.config(vec![pair.to_string()]).without_idle_sweep();
    let sink = open_sink(output).await?;
    let handle = Engine::start(config, sink).context("Failed to start engine")?;

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] page {pos} {msg}")?,
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message(format!("{pair} {} -> {}", format_ms(range.from_ms), format_ms(range.to_ms)));
        pb
    };

    let mut fetched = 0usize;
    let mut failure: Option<anyhow::Error> = None;
    let mut stream = std::pin::pin!(backfill_stream(&client, pair, range));

    while let Some(batch) = stream.next().await {
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) => {
                failure = Some(anyhow::Error::new(e).context(format!("Backfill of {pair} failed")));
                break;
            }
        };

        fetched += batch.len();
        for raw in batch.trades {
            if let Err(e) = handle.submit_raw(raw).await {
                failure = Some(anyhow::Error::new(e).context("Engine stopped accepting trades"));
                break;
            }
        }
        if failure.is_some() {
            break;
        }
        progress.set_position(batch.page as u64);
        progress.set_message(format!("{pair} {fetched} trades, at {}", format_ms(batch.cursor_ms)));
    }

    if failure.is_some() {
        progress.abandon_with_message(format!("Stopped after {fetched} trades"));
    }
    let report = shutdown_engine(handle, failure).await?;

    progress.finish_with_message(format!(
        "Aggregated {} trades into {} candles",
        report.stats.trades_accepted,
        report.stats.windows_closed()
    ));

    if !quiet {
        eprintln!("{}", report.stats);
        if let Some(path) = &output.output {
            eprintln!("Output written to: {}", path.display());
        }
    }

    Ok(())
}
