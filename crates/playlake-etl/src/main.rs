//! `playlake` binary entrypoint.
//!
//! Reads `dl.toml` from the working directory, runs the pipeline once and
//! exits. A failed run exits non-zero with the error that aborted it.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use anyhow::{Context, Result};

use playlake_core::observability::init_logging;
use playlake_core::{Config, DEFAULT_CONFIG_PATH};
use playlake_etl::metrics::register_metrics;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load(DEFAULT_CONFIG_PATH)
        .with_context(|| format!("failed to load {DEFAULT_CONFIG_PATH}"))?;

    init_logging(config.log_format);
    register_metrics();

    tracing::info!(
        input = %config.input_root,
        output = %config.output_root,
        compression = config.compression.as_parquet_codec(),
        "starting playlake run"
    );

    let report = playlake_etl::run(&config).await.context("pipeline run failed")?;
    tracing::info!(
        run_id = %report.run_id,
        songplays = report.songplays,
        elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
        "playlake run finished"
    );
    Ok(())
}
