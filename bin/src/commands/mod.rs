//! CLI command implementations.

use anyhow::{Context, Result};
use ohlcflow_lib::prelude::*;

pub(crate) mod backfill;
pub(crate) mod run;

/// Shuts the engine down, flushing open windows, then reports `failure` if
/// the feed stopped on an error.
pub(crate) async fn shutdown_engine(
    handle: EngineHandle,
    failure: Option<anyhow::Error>,
) -> Result<EngineReport> {
    let report = handle.shutdown().await.context("Engine shutdown failed");
    match failure {
        Some(e) => Err(e),
        None => report,
    }
}
