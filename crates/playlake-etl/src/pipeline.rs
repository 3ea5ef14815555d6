//! Pipeline driver.
//!
//! A run executes the three stages strictly in order:
//!
//! ```text
//! catalog ──► song, artist
//! events  ──► user, time ──┐
//! songplay ◄── song, artist (re-read from storage)
//! ```
//!
//! The first failure aborts the run. Tables written by earlier stages stay
//! on storage; nothing marks a run as resumable.

use std::time::{Duration, Instant};

use playlake_core::observability::{pipeline_span, stage_span};
use playlake_core::{Config, Error, Namespace, OutputTable, Result, RunId};
use tracing::{Instrument, Span};

use crate::engine::{DataFusionEngine, TableEngine};
use crate::metrics::record_stage_duration;
use crate::{catalog, events, fact};

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Identifier of the run.
    pub run_id: RunId,
    /// Raw catalog files read.
    pub catalog_files: usize,
    /// Raw event files read.
    pub event_files: usize,
    /// Rows written to the song table.
    pub songs: u64,
    /// Rows written to the artist table.
    pub artists: u64,
    /// Rows written to the user table.
    pub users: u64,
    /// Rows written to the time table.
    pub time: u64,
    /// Rows written to the song-play table.
    pub songplays: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunReport {
    /// Returns the rows written to `table`.
    #[must_use]
    pub const fn rows_written(&self, table: OutputTable) -> u64 {
        match table {
            OutputTable::Song => self.songs,
            OutputTable::Artist => self.artists,
            OutputTable::User => self.users,
            OutputTable::Time => self.time,
            OutputTable::SongPlay => self.songplays,
        }
    }
}

/// Execution context of one run: the engine plus resolved namespaces.
///
/// Opened explicitly before the stages and closed explicitly after them.
#[derive(Debug)]
pub struct RunContext<E = DataFusionEngine> {
    run_id: RunId,
    engine: E,
    catalog_source: Namespace,
    event_source: Namespace,
    output_root: Namespace,
    span: Span,
    started: Instant,
}

impl RunContext<DataFusionEngine> {
    /// Opens a run context backed by a fresh DataFusion session.
    ///
    /// # Errors
    ///
    /// Returns [`playlake_core::Error::Configuration`] if the configuration is
    /// invalid or a root cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        Self::with_engine(config, DataFusionEngine::new(config.compression))
    }
}

impl<E: TableEngine> RunContext<E> {
    /// Opens a run context on the given engine.
    ///
    /// # Errors
    ///
    /// Returns [`playlake_core::Error::Configuration`] if the configuration is
    /// invalid or a root cannot be opened.
    pub fn with_engine(config: &Config, engine: E) -> Result<Self> {
        config.validate()?;

        let input_root = Namespace::open(&config.input_root, &config.credentials)?;
        let output_root = Namespace::open(&config.output_root, &config.credentials)?;
        engine.register_namespace(&input_root);
        engine.register_namespace(&output_root);

        let run_id = RunId::generate();
        let span = pipeline_span(
            &run_id.to_string(),
            &input_root.url(),
            &output_root.url(),
        );
        span.in_scope(|| tracing::info!("run context opened"));

        Ok(Self {
            run_id,
            engine,
            catalog_source: input_root.child(&config.catalog_dir),
            event_source: input_root.child(&config.event_dir),
            output_root,
            span,
            started: Instant::now(),
        })
    }

    /// Returns the run identifier.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Runs catalog, event and fact stages in order.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; later stages do not run.
    pub async fn execute(&self) -> Result<RunReport> {
        let span = self.span.clone();
        async {
            let engine = &self.engine;

            let started = Instant::now();
            let catalog = catalog::run(engine, &self.catalog_source, &self.output_root)
                .instrument(stage_span("catalog"))
                .await?;
            record_stage_duration("catalog", started.elapsed());

            let started = Instant::now();
            let events = events::run(engine, &self.event_source, &self.output_root)
                .instrument(stage_span("events"))
                .await?;
            record_stage_duration("events", started.elapsed());

            let started = Instant::now();
            let songplays = fact::run(engine, events.plays, &self.output_root)
                .instrument(stage_span("songplay"))
                .await?;
            record_stage_duration("songplay", started.elapsed());

            Ok::<_, Error>(RunReport {
                run_id: self.run_id,
                catalog_files: catalog.files,
                event_files: events.files,
                songs: catalog.songs,
                artists: catalog.artists,
                users: events.users,
                time: events.time,
                songplays,
                elapsed: self.started.elapsed(),
            })
        }
        .instrument(span)
        .await
    }

    /// Closes the context and logs how the run ended.
    pub fn close(self, outcome: &Result<RunReport>) {
        let _guard = self.span.enter();
        match outcome {
            Ok(report) => tracing::info!(
                catalog_files = report.catalog_files,
                event_files = report.event_files,
                songs = report.songs,
                artists = report.artists,
                users = report.users,
                time = report.time,
                songplays = report.songplays,
                elapsed_ms = u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                "run completed"
            ),
            Err(e) => tracing::error!(
                error = %e,
                elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
                "run failed"
            ),
        }
    }
}

/// Runs the whole pipeline for `config`.
///
/// # Errors
///
/// Returns a configuration error before any stage runs, or the first stage
/// failure.
pub async fn run(config: &Config) -> Result<RunReport> {
    let context = RunContext::open(config)?;
    let outcome = context.execute().await;
    context.close(&outcome);
    outcome
}

#[cfg(test)]
mod tests {
    use playlake_test_utils::LakeFixture;

    use super::*;

    #[tokio::test]
    async fn empty_input_writes_empty_tables() {
        let lake = LakeFixture::new();

        let report = run(&lake.config()).await.expect("run");

        for table in OutputTable::ALL {
            assert_eq!(report.rows_written(table), 0, "{table}");
        }
        assert_eq!(report.catalog_files, 0);
        assert_eq!(report.event_files, 0);
    }

    #[test]
    fn invalid_config_fails_before_open() {
        let lake = LakeFixture::new();
        let mut config = lake.config();
        config.output_root = String::new();

        let err = RunContext::open(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
