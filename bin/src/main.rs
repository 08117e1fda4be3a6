//! ohlcflow CLI - Streaming trade-to-candle aggregation.

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use ohlcflow_lib::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "ohlcflow")]
#[command(about = "Aggregate trade streams into OHLC candles", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (errors only, no progress output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate newline-delimited JSON trades until end of input or Ctrl-C
    Run {
        /// Symbols to aggregate, comma separated (e.g. BTC/USD,ETH/USD)
        #[arg(short, long, env = "OHLC_SYMBOLS", value_delimiter = ',', required = true)]
        symbols: Vec<String>,

        /// Input file. Defaults to stdin.
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Fetch historical trades for a pair and aggregate them
    Backfill {
        /// Exchange pair (e.g. XBT/USD)
        pair: String,

        /// Range start: YYYY-MM-DD, RFC 3339 or epoch milliseconds
        #[arg(long)]
        from: String,

        /// Range end (exclusive): YYYY-MM-DD, RFC 3339 or epoch milliseconds
        #[arg(long)]
        to: String,

        /// Exchange REST endpoint
        #[arg(long, env = "OHLC_REST_URL", hide = true)]
        base_url: Option<String>,

        #[command(flatten)]
        output: OutputArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },
}

/// Where and how candles are written.
#[derive(Args)]
pub(crate) struct OutputArgs {
    /// Output file path. Defaults to stdout.
    #[arg(short, long)]
    pub(crate) output: Option<PathBuf>,

    /// Output format (ndjson, csv)
    #[arg(short, long, default_value = "ndjson")]
    pub(crate) format: OutputFormat,

    /// Retries for a failed sink write
    #[arg(long, env = "OHLC_SINK_RETRIES", default_value = "3")]
    pub(crate) sink_retries: u32,
}

/// Engine knobs shared by every command.
#[derive(Args)]
pub(crate) struct EngineArgs {
    /// Window duration (e.g. 10s, 1m, 5m, 1h; a bare number means seconds)
    #[arg(short, long, env = "OHLC_WINDOW_SECONDS", default_value = "1m")]
    window: WindowSpec,

    /// Grace after a window's end before an idle window is closed. Defaults to a tenth of the window.
    #[arg(long, env = "OHLC_IDLE_GRACE_MS")]
    idle_grace_ms: Option<i64>,

    /// Idle sweep period in milliseconds. Defaults to min(1s, window / 4).
    #[arg(long, env = "OHLC_SWEEP_INTERVAL_MS")]
    sweep_interval_ms: Option<u64>,

    /// Aggregation workers
    #[arg(long, env = "OHLC_WORKERS", default_value = "4")]
    workers: usize,

    /// Pending candle records before the oldest is dropped
    #[arg(long, env = "OHLC_QUEUE_CAPACITY", default_value = "4096")]
    queue_capacity: usize,

    /// Emission mode (continuous, close-only)
    #[arg(long, env = "OHLC_EMISSION_MODE", default_value = "continuous")]
    mode: EmissionMode,
}

impl EngineArgs {
    /// Builds the engine configuration for the given symbols.
    pub(crate) fn config(&self, symbols: Vec<String>) -> EngineConfig {
        let mut config = EngineConfig::new(self.window, symbols)
            .with_workers(self.workers)
            .with_queue_capacity(self.queue_capacity)
            .with_mode(self.mode);
        if let Some(grace_ms) = self.idle_grace_ms {
            config = config.with_idle_grace_ms(grace_ms);
        }
        if let Some(interval_ms) = self.sweep_interval_ms {
            config = config.with_sweep_interval(Duration::from_millis(interval_ms));
        }
        config
    }
}

/// Installs the log subscriber. Logs go to stderr; stdout carries candles.
fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Run {
            symbols,
            input,
            output,
            engine,
        } => commands::run::run(symbols, input, &output, &engine, cli.quiet).await,
        Commands::Backfill {
            pair,
            from,
            to,
            base_url,
            output,
            engine,
        } => {
            commands::backfill::backfill(
                &pair,
                &from,
                &to,
                base_url.as_deref(),
                &output,
                &engine,
                cli.quiet,
            )
            .await
        }
    }
}
