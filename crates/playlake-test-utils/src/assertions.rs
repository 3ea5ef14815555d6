//! Assertion helpers for table contents.
//!
//! Table values are compared as strings so tests can state expectations
//! without caring about the physical Arrow type of each column.

use std::collections::HashSet;
use std::path::Path;

use arrow::array::{Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

/// Returns the total number of rows across batches.
pub fn total_rows(batches: &[RecordBatch]) -> usize {
    batches.iter().map(RecordBatch::num_rows).sum()
}

/// Returns the values of one column as optional strings, in batch order.
///
/// # Panics
///
/// Panics if the column is missing or cannot be rendered as text.
pub fn column_values(batches: &[RecordBatch], column: &str) -> Vec<Option<String>> {
    let mut values = Vec::new();
    for batch in batches {
        let array = batch
            .column_by_name(column)
            .unwrap_or_else(|| panic!("missing column {column}"));
        let text = cast(array, &DataType::Utf8).expect("cast to utf8");
        let text = text
            .as_any()
            .downcast_ref::<StringArray>()
            .expect("utf8 array");
        values.extend((0..text.len()).map(|i| text.is_valid(i).then(|| text.value(i).to_string())));
    }
    values
}

/// Returns the selected columns as rows of optional strings, sorted.
///
/// Sorting makes the result independent of engine row order.
pub fn string_rows(batches: &[RecordBatch], columns: &[&str]) -> Vec<Vec<Option<String>>> {
    let per_column: Vec<_> = columns.iter().map(|c| column_values(batches, c)).collect();
    let mut rows: Vec<Vec<Option<String>>> = (0..total_rows(batches))
        .map(|row| per_column.iter().map(|values| values[row].clone()).collect())
        .collect();
    rows.sort();
    rows
}

/// Asserts that a column has no nulls.
///
/// # Panics
///
/// Panics if any value of the column is null.
pub fn assert_no_nulls(batches: &[RecordBatch], column: &str) {
    let nulls = column_values(batches, column)
        .iter()
        .filter(|v| v.is_none())
        .count();
    assert_eq!(nulls, 0, "column {column} has {nulls} null values");
}

/// Asserts that no two rows are identical across all columns.
///
/// # Panics
///
/// Panics if a row appears more than once.
pub fn assert_no_duplicate_rows(batches: &[RecordBatch]) {
    let Some(first) = batches.first() else {
        return;
    };
    let schema = first.schema();
    let columns: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    let rows = string_rows(batches, &columns);
    let unique: HashSet<_> = rows.iter().collect();
    assert_eq!(unique.len(), rows.len(), "table contains duplicate rows");
}

/// Lists all files below `dir`, relative to it, with `/` separators, sorted.
pub fn relative_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            entry.path().strip_prefix(dir).ok().map(|relative| {
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
        })
        .collect();
    files.sort();
    files
}

/// Lists the partition directories (`col=value/...`) that contain files.
pub fn partition_dirs(dir: &Path) -> Vec<String> {
    let mut dirs: Vec<String> = relative_files(dir)
        .into_iter()
        .filter_map(|file| file.rsplit_once('/').map(|(parent, _)| parent.to_string()))
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::Int32Array;
    use arrow::datatypes::{Field, Schema};

    use super::*;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, true),
            Field::new("n", DataType::Int32, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("b"), Some("a"), None])),
                Arc::new(Int32Array::from(vec![Some(2), Some(1), Some(3)])),
            ],
        )
        .expect("batch")
    }

    #[test]
    fn rows_are_sorted_strings() {
        let rows = string_rows(&[batch()], &["id", "n"]);
        assert_eq!(
            rows,
            vec![
                vec![None, Some("3".to_string())],
                vec![Some("a".to_string()), Some("1".to_string())],
                vec![Some("b".to_string()), Some("2".to_string())],
            ]
        );
    }

    #[test]
    #[should_panic(expected = "null values")]
    fn null_detection() {
        assert_no_nulls(&[batch()], "id");
    }

    #[test]
    fn relative_files_use_forward_slashes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("year=2000").join("artist_id=A1");
        std::fs::create_dir_all(&nested).expect("mkdir");
        std::fs::write(nested.join("part-0.parquet"), b"").expect("write");

        assert_eq!(
            relative_files(dir.path()),
            vec!["year=2000/artist_id=A1/part-0.parquet".to_string()]
        );
        assert_eq!(
            partition_dirs(dir.path()),
            vec!["year=2000/artist_id=A1".to_string()]
        );
    }
}
