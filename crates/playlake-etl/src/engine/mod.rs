//! Table engine abstraction.
//!
//! The extractors and the fact builder describe a logical dataflow (read,
//! filter, project, join, deduplicate, write) against [`TableEngine`]. The
//! engine owns execution: frames are lazy and nothing runs until a frame is
//! written or counted.
//!
//! | Operation | Used by |
//! |-----------|---------|
//! | [`TableEngine::read_structured`] | catalog and event stages |
//! | [`TableEngine::read_columnar`] | fact stage (persisted song/artist) |
//! | [`TableEngine::with_time_parts`] | event stage |
//! | [`TableEngine::first_row_per_key`] | fact stage (song context) |
//! | [`TableEngine::write_partitioned`] | every stage |

mod datafusion_engine;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use playlake_core::{Namespace, OutputTable, RecordSchema, Result};

pub use self::datafusion_engine::DataFusionEngine;
use crate::metrics::record_rows_written;

/// Row predicate understood by [`TableEngine::filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate<'a> {
    /// The column is not null.
    NotNull(&'a str),
    /// The column equals the given text.
    Equals(&'a str, &'a str),
}

/// Join kind understood by [`TableEngine::join`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Keep only rows with a match on both sides.
    Inner,
    /// Keep every left row; unmatched right columns are null.
    Left,
}

/// Dataframe operations the pipeline needs from an execution engine.
#[async_trait]
pub trait TableEngine: Send + Sync {
    /// A lazily evaluated table.
    type Frame: Clone + Send + Sync;

    /// Makes the namespace's storage backend reachable by the engine.
    fn register_namespace(&self, namespace: &Namespace);

    /// Reads newline-delimited JSON files with a declared schema.
    ///
    /// Absent fields read as null. An empty file list yields an empty frame
    /// with the declared schema.
    async fn read_structured(&self, files: &[String], schema: &RecordSchema)
    -> Result<Self::Frame>;

    /// Reads a persisted table back with its declared column layout.
    ///
    /// Partition columns are restored from the directory names to their
    /// declared types. A table with no files yields an empty frame.
    async fn read_columnar(&self, source: &Namespace, table: OutputTable) -> Result<Self::Frame>;

    /// Keeps rows matching the predicate.
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist.
    fn filter(&self, frame: Self::Frame, predicate: Predicate<'_>) -> Result<Self::Frame>;

    /// Projects the given columns, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if a column does not exist.
    fn select(&self, frame: Self::Frame, columns: &[&str]) -> Result<Self::Frame>;

    /// Renames one column.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename is rejected by the engine.
    fn rename(&self, frame: Self::Frame, from: &str, to: &str) -> Result<Self::Frame>;

    /// Removes rows that are identical in every column.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot plan the deduplication.
    fn drop_duplicates(&self, frame: Self::Frame) -> Result<Self::Frame>;

    /// Reduces the frame to one row per distinct key. Of the rows sharing a
    /// key, the one whose value columns sort first (in the given order) is
    /// kept whole.
    ///
    /// # Errors
    ///
    /// Returns an error if a column does not exist.
    fn first_row_per_key(
        &self,
        frame: Self::Frame,
        keys: &[&str],
        values: &[&str],
    ) -> Result<Self::Frame>;

    /// Joins two frames on pairs of equal columns.
    ///
    /// # Errors
    ///
    /// Returns an error if a join column does not exist or the two sides
    /// share a column name.
    fn join(
        &self,
        left: Self::Frame,
        right: Self::Frame,
        on: &[(&str, &str)],
        kind: JoinKind,
    ) -> Result<Self::Frame>;

    /// Derives `start_time` (UTC timestamp) and `hour`, `day`, `week`,
    /// `month`, `year`, `weekday` from an epoch-milliseconds column.
    ///
    /// `week` is the ISO week of the year; `weekday` runs from 1 (Sunday)
    /// to 7 (Saturday).
    ///
    /// # Errors
    ///
    /// Returns an error if the column does not exist.
    fn with_time_parts(&self, frame: Self::Frame, epoch_millis: &str) -> Result<Self::Frame>;

    /// Writes the frame as Parquet below `destination`, replacing whatever
    /// was there, and returns the number of rows written.
    ///
    /// Rows are split into `column=value/` directories by the partition
    /// columns, outermost first.
    async fn write_partitioned(
        &self,
        frame: Self::Frame,
        destination: &Namespace,
        partition_columns: &[&str],
    ) -> Result<u64>;

    /// Executes the frame and returns its row count.
    async fn count(&self, frame: Self::Frame) -> Result<u64>;

    /// Executes the frame and returns its batches.
    async fn collect(&self, frame: Self::Frame) -> Result<Vec<RecordBatch>>;

    /// Returns the column names of a frame in order.
    fn column_names(&self, frame: &Self::Frame) -> Vec<String>;
}

/// Writes `frame` as `table` below the output root and returns the rows
/// written.
///
/// The frame is projected to the table's declared columns first, so stages
/// may hand over frames carrying extra columns.
///
/// # Errors
///
/// Returns an error if projection, clearing the old table or the write fails.
pub async fn persist<E: TableEngine + ?Sized>(
    engine: &E,
    frame: E::Frame,
    output_root: &Namespace,
    table: OutputTable,
) -> Result<u64> {
    let destination = output_root.child(table.dir_name());
    let frame = engine.select(frame, &table.column_names())?;
    let rows = engine
        .write_partitioned(frame, &destination, table.partition_columns())
        .await?;

    record_rows_written(table, rows);
    tracing::info!(
        table = %table,
        location = %destination.url(),
        partitions = ?table.partition_columns(),
        rows,
        "table written"
    );
    Ok(rows)
}
