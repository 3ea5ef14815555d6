//! Event stage: user and time dimensions.
//!
//! Only `NextSong` events are plays; every other page (logins, navigation,
//! settings) is dropped before any table is derived.

use playlake_core::{Namespace, OutputTable, RecordKind, Result, schema_for};

use crate::engine::{Predicate, TableEngine, persist};
use crate::metrics::record_input_files;

/// Page value that marks a play event.
pub const PLAY_PAGE: &str = "NextSong";

/// Output of the event stage.
#[derive(Debug, Clone)]
pub struct EventsOutput<F> {
    /// Raw event files read.
    pub files: usize,
    /// Rows written to the user table.
    pub users: u64,
    /// Rows written to the time table.
    pub time: u64,
    /// Play events with derived time parts, for the fact stage.
    pub plays: F,
}

/// Reads every event record below `source`, at any nesting depth.
///
/// Returns the frame and the number of files it covers.
///
/// # Errors
///
/// Returns an error if listing fails or the engine rejects the read.
pub async fn read_events<E: TableEngine>(
    engine: &E,
    source: &Namespace,
) -> Result<(E::Frame, usize)> {
    let files = source.list_files("json").await?;
    record_input_files(RecordKind::Event.as_str(), files.len());
    tracing::info!(files = files.len(), location = %source.url(), "reading event records");

    let frame = engine
        .read_structured(&files, &schema_for(RecordKind::Event))
        .await?;
    Ok((frame, files.len()))
}

/// Keeps play events only.
///
/// # Errors
///
/// Returns an error if the engine cannot plan the filter.
pub fn play_events<E: TableEngine>(engine: &E, events: E::Frame) -> Result<E::Frame> {
    engine.filter(events, Predicate::Equals("page", PLAY_PAGE))
}

/// Builds the user dimension from play events.
///
/// Rows are deduplicated whole, so a user whose level changed keeps one row
/// per observed level.
///
/// # Errors
///
/// Returns an error if the engine cannot plan the projection.
pub fn extract_users<E: TableEngine>(engine: &E, plays: E::Frame) -> Result<E::Frame> {
    let users = engine.select(plays, &OutputTable::User.column_names())?;
    let users = engine.filter(users, Predicate::NotNull("userId"))?;
    engine.drop_duplicates(users)
}

/// Adds `start_time` and the derived calendar parts to play events.
///
/// # Errors
///
/// Returns an error if the engine cannot plan the derivation.
pub fn with_start_time<E: TableEngine>(engine: &E, plays: E::Frame) -> Result<E::Frame> {
    engine.with_time_parts(plays, "ts")
}

/// Builds the time dimension: one row per play event, duplicates kept.
///
/// # Errors
///
/// Returns an error if the frame lacks the derived time parts.
pub fn extract_time<E: TableEngine>(engine: &E, timed_plays: E::Frame) -> Result<E::Frame> {
    engine.select(timed_plays, &OutputTable::Time.column_names())
}

/// Runs the event stage: reads `source`, writes the user and time tables
/// below `output_root` and hands the timed play events on.
///
/// # Errors
///
/// Returns the first read, schema or write failure.
pub async fn run<E: TableEngine>(
    engine: &E,
    source: &Namespace,
    output_root: &Namespace,
) -> Result<EventsOutput<E::Frame>> {
    let (events, files) = read_events(engine, source).await?;
    let plays = play_events(engine, events)?;

    let users = extract_users(engine, plays.clone())?;
    let users = persist(engine, users, output_root, OutputTable::User).await?;

    let timed = with_start_time(engine, plays)?;
    let time = extract_time(engine, timed.clone())?;
    let time = persist(engine, time, output_root, OutputTable::Time).await?;

    Ok(EventsOutput {
        files,
        users,
        time,
        plays: timed,
    })
}
