//! Pipeline metrics.
//!
//! Row and file counters plus stage timings. These complement the structured
//! logging in each stage; no recorder is installed by the pipeline itself.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use playlake_core::OutputTable;

/// Rows written per output table.
pub const ROWS_WRITTEN: &str = "playlake_rows_written_total";

/// Stage duration histogram.
pub const STAGE_DURATION: &str = "playlake_stage_duration_seconds";

/// Raw input files read per source.
pub const INPUT_FILES: &str = "playlake_input_files_total";

/// Registers all pipeline metric descriptions.
///
/// Call this once at application startup after initializing the metrics recorder.
pub fn register_metrics() {
    describe_counter!(ROWS_WRITTEN, "Total rows written per output table");
    describe_histogram!(STAGE_DURATION, "Duration of pipeline stages in seconds");
    describe_counter!(INPUT_FILES, "Total raw input files read per source");
}

/// Records rows written to a table.
pub fn record_rows_written(table: OutputTable, rows: u64) {
    counter!(ROWS_WRITTEN, "table" => table.dir_name()).increment(rows);
}

/// Records the number of raw input files found for a source.
pub fn record_input_files(source: &str, files: usize) {
    counter!(INPUT_FILES, "source" => source.to_string())
        .increment(u64::try_from(files).unwrap_or(u64::MAX));
}

/// Records the duration of a completed stage.
pub fn record_stage_duration(stage: &str, elapsed: Duration) {
    histogram!(STAGE_DURATION, "stage" => stage.to_string()).record(elapsed.as_secs_f64());
}
