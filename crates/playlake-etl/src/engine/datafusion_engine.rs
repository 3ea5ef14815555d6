//! [`TableEngine`] on Apache DataFusion.
//!
//! Raw records are read with DataFusion's NDJSON reader and tables are
//! written through its hive-partitioned Parquet sink. Partition values are
//! written as text; a null value becomes [`NULL_PARTITION_VALUE`] and is
//! turned back into null when the table is read.
//!
//! Column references are built with [`ident`]: layout names such as `userId`
//! are case-sensitive and must not go through SQL identifier normalization.

use arrow::array::UInt64Array;
use arrow::datatypes::{DataType, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::config::TableParquetOptions;
use datafusion::dataframe::{DataFrame, DataFrameWriteOptions};
use datafusion::error::DataFusionError;
use datafusion::functions::expr_fn::{coalesce, date_part, nullif, to_timestamp_millis};
use datafusion::functions_aggregate::expr_fn::first_value;
use datafusion::logical_expr::{Expr, JoinType, SortExpr, cast, lit};
use datafusion::prelude::{
    NdJsonReadOptions, ParquetReadOptions, SessionConfig, SessionContext, ident,
};
use playlake_core::{
    Compression, Error, NULL_PARTITION_VALUE, Namespace, OutputTable, RecordSchema, Result,
};

use super::{JoinKind, Predicate, TableEngine};

/// Derived time columns, in output order.
const TIME_PARTS: [&str; 6] = ["hour", "day", "week", "month", "year", "weekday"];

/// DataFusion-backed table engine.
///
/// One engine holds one [`SessionContext`] for the whole run.
#[derive(Clone)]
pub struct DataFusionEngine {
    ctx: SessionContext,
    compression: Compression,
}

impl std::fmt::Debug for DataFusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionEngine")
            .field("session_id", &self.ctx.session_id())
            .field("compression", &self.compression)
            .finish()
    }
}

impl DataFusionEngine {
    /// Creates an engine that writes Parquet with the given compression.
    #[must_use]
    pub fn new(compression: Compression) -> Self {
        let config = SessionConfig::new().with_information_schema(false);
        Self {
            ctx: SessionContext::new_with_config(config),
            compression,
        }
    }

    /// Returns the underlying session.
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.ctx
    }

    fn parquet_options(&self) -> TableParquetOptions {
        let mut options = TableParquetOptions::default();
        options.global.compression = Some(self.compression.as_parquet_codec().to_string());
        options
    }

    fn empty_frame(&self, schema: SchemaRef) -> Result<DataFrame> {
        self.ctx
            .read_batch(RecordBatch::new_empty(schema))
            .map_err(|e| map_engine_error("failed to create empty frame", e))
    }
}

#[async_trait]
impl TableEngine for DataFusionEngine {
    type Frame = DataFrame;

    fn register_namespace(&self, namespace: &Namespace) {
        self.ctx
            .register_object_store(namespace.store_url(), namespace.object_store());
    }

    async fn read_structured(&self, files: &[String], schema: &RecordSchema) -> Result<DataFrame> {
        let arrow_schema = schema.to_arrow();
        if files.is_empty() {
            tracing::debug!(record_kind = %schema.kind(), "no input files, using empty frame");
            return self.empty_frame(arrow_schema);
        }

        let options = NdJsonReadOptions::default()
            .schema(arrow_schema.as_ref())
            .file_extension(".json");
        self.ctx
            .read_json(files.to_vec(), options)
            .await
            .map_err(|e| map_engine_error(format!("failed to read {} records", schema.kind()), e))
    }

    async fn read_columnar(&self, source: &Namespace, table: OutputTable) -> Result<DataFrame> {
        if source.list_files("parquet").await?.is_empty() {
            tracing::debug!(table = %table, location = %source.url(), "no persisted files");
            return self.empty_frame(table.arrow_schema());
        }

        let partition_cols = table
            .partition_columns()
            .iter()
            .map(|c| ((*c).to_string(), DataType::Utf8))
            .collect();
        let options = ParquetReadOptions::default().table_partition_cols(partition_cols);
        let frame = self
            .ctx
            .read_parquet(source.url(), options)
            .await
            .map_err(|e| map_engine_error(format!("failed to read table {table}"), e))?;

        let projection: Vec<Expr> = table
            .fields()
            .iter()
            .map(|field| {
                if table.is_partition_column(field.name) {
                    cast(
                        nullif(ident(field.name), lit(NULL_PARTITION_VALUE)),
                        field.semantic_type.arrow_type(),
                    )
                    .alias(field.name)
                } else {
                    ident(field.name)
                }
            })
            .collect();
        frame
            .select(projection)
            .map_err(|e| map_engine_error(format!("failed to restore layout of {table}"), e))
    }

    fn filter(&self, frame: DataFrame, predicate: Predicate<'_>) -> Result<DataFrame> {
        let expr = match predicate {
            Predicate::NotNull(column) => ident(column).is_not_null(),
            Predicate::Equals(column, value) => ident(column).eq(lit(value)),
        };
        frame
            .filter(expr)
            .map_err(|e| map_engine_error(format!("failed to apply {predicate:?}"), e))
    }

    fn select(&self, frame: DataFrame, columns: &[&str]) -> Result<DataFrame> {
        frame
            .select_columns(columns)
            .map_err(|e| map_engine_error(format!("failed to select {columns:?}"), e))
    }

    fn rename(&self, frame: DataFrame, from: &str, to: &str) -> Result<DataFrame> {
        frame
            .with_column_renamed(from, to)
            .map_err(|e| map_engine_error(format!("failed to rename {from} to {to}"), e))
    }

    fn drop_duplicates(&self, frame: DataFrame) -> Result<DataFrame> {
        frame
            .distinct()
            .map_err(|e| map_engine_error("failed to deduplicate", e))
    }

    fn first_row_per_key(
        &self,
        frame: DataFrame,
        keys: &[&str],
        values: &[&str],
    ) -> Result<DataFrame> {
        // Every value column is ordered by the same full tuple, so all of
        // them are taken from the same input row.
        let order: Vec<SortExpr> = values.iter().map(|v| ident(*v).sort(true, false)).collect();
        let group: Vec<Expr> = keys.iter().map(|k| ident(*k)).collect();
        let aggregates: Vec<Expr> = values
            .iter()
            .map(|v| first_value(ident(*v), Some(order.clone())).alias(*v))
            .collect();
        frame
            .aggregate(group, aggregates)
            .map_err(|e| map_engine_error(format!("failed to group by {keys:?}"), e))
    }

    fn join(
        &self,
        left: DataFrame,
        right: DataFrame,
        on: &[(&str, &str)],
        kind: JoinKind,
    ) -> Result<DataFrame> {
        let left_cols: Vec<&str> = on.iter().map(|(l, _)| *l).collect();
        let right_cols: Vec<&str> = on.iter().map(|(_, r)| *r).collect();
        let join_type = match kind {
            JoinKind::Inner => JoinType::Inner,
            JoinKind::Left => JoinType::Left,
        };
        left.join(right, join_type, &left_cols, &right_cols, None)
            .map_err(|e| map_engine_error(format!("failed to join on {on:?}"), e))
    }

    fn with_time_parts(&self, frame: DataFrame, epoch_millis: &str) -> Result<DataFrame> {
        let mut frame = frame
            .with_column("start_time", to_timestamp_millis(vec![ident(epoch_millis)]))
            .map_err(|e| map_engine_error(format!("failed to convert {epoch_millis}"), e))?;

        for part in TIME_PARTS {
            let expr = match part {
                // dow counts from 0 = Sunday
                "weekday" => {
                    cast(date_part(lit("dow"), ident("start_time")), DataType::Int32) + lit(1)
                }
                _ => cast(date_part(lit(part), ident("start_time")), DataType::Int32),
            };
            frame = frame
                .with_column(part, expr)
                .map_err(|e| map_engine_error(format!("failed to derive {part}"), e))?;
        }
        Ok(frame)
    }

    async fn write_partitioned(
        &self,
        frame: DataFrame,
        destination: &Namespace,
        partition_columns: &[&str],
    ) -> Result<u64> {
        let removed = destination.clear().await?;
        if removed > 0 {
            tracing::debug!(location = %destination.url(), removed, "cleared previous output");
        }

        let projection: Vec<Expr> = frame
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name().as_str();
                if partition_columns.contains(&name) {
                    coalesce(vec![
                        cast(ident(name), DataType::Utf8),
                        lit(NULL_PARTITION_VALUE),
                    ])
                    .alias(name)
                } else {
                    ident(name)
                }
            })
            .collect();
        let frame = frame
            .select(projection)
            .map_err(|e| map_engine_error("failed to prepare partition columns", e))?;

        let url = destination.url();
        let write_options = DataFrameWriteOptions::new().with_partition_by(
            partition_columns.iter().map(|c| (*c).to_string()).collect(),
        );
        let batches = frame
            .write_parquet(&url, write_options, Some(self.parquet_options()))
            .await
            .map_err(|e| map_engine_error(format!("failed to write {url}"), e))?;

        Ok(rows_in_write_result(&batches))
    }

    async fn count(&self, frame: DataFrame) -> Result<u64> {
        let rows = frame
            .count()
            .await
            .map_err(|e| map_engine_error("failed to count rows", e))?;
        Ok(u64::try_from(rows).unwrap_or(u64::MAX))
    }

    async fn collect(&self, frame: DataFrame) -> Result<Vec<RecordBatch>> {
        frame
            .collect()
            .await
            .map_err(|e| map_engine_error("failed to collect frame", e))
    }

    fn column_names(&self, frame: &DataFrame) -> Vec<String> {
        frame
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }
}

/// Sums the row counts DataFusion reports for a write.
fn rows_in_write_result(batches: &[RecordBatch]) -> u64 {
    batches
        .iter()
        .filter(|batch| batch.num_columns() > 0)
        .filter_map(|batch| {
            batch
                .column(0)
                .as_any()
                .downcast_ref::<UInt64Array>()
                .map(|counts| counts.iter().flatten().sum::<u64>())
        })
        .sum()
}

/// Maps a DataFusion error onto the pipeline's failure classes.
///
/// Decoder, parse and cast failures anywhere in the cause chain mean raw data
/// did not match its declared schema.
pub(crate) fn map_engine_error(context: impl Into<String>, err: DataFusionError) -> Error {
    let context = context.into();
    if is_schema_violation(&err) {
        return Error::schema_violation(format!("{context}: {err}"));
    }
    if is_storage_failure(&err) {
        return Error::storage_with_source(context, err);
    }
    if is_flattened_decode_error(&err) {
        return Error::schema_violation(format!("{context}: {err}"));
    }
    Error::engine_with_source(context, err)
}

fn is_schema_violation(err: &DataFusionError) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(arrow) = e.downcast_ref::<ArrowError>() {
            if matches!(
                arrow,
                ArrowError::JsonError(_) | ArrowError::ParseError(_) | ArrowError::CastError(_)
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Errors raised inside spawned write tasks can arrive flattened to text.
/// Only arrow's own decoder prefixes count.
fn is_flattened_decode_error(err: &DataFusionError) -> bool {
    let message = err.to_string();
    ["Json error: ", "Parser error: ", "Cast error: "]
        .iter()
        .any(|prefix| message.contains(prefix))
}

fn is_storage_failure(err: &DataFusionError) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if e.is::<object_store::Error>() {
            return true;
        }
        if matches!(
            e.downcast_ref::<DataFusionError>(),
            Some(DataFusionError::ObjectStore(_) | DataFusionError::IoError(_))
        ) {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use chrono::{Datelike, TimeZone, Timelike, Utc};
    use playlake_core::StorageCredentials;
    use playlake_test_utils::{LakeFixture, string_rows};

    use super::*;

    fn engine() -> DataFusionEngine {
        DataFusionEngine::new(Compression::Snappy)
    }

    fn ts_frame(engine: &DataFusionEngine, values: Vec<i64>) -> DataFrame {
        let schema = Arc::new(Schema::new(vec![Field::new("ts", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values))])
            .expect("batch");
        engine.session().read_batch(batch).expect("frame")
    }

    fn int_column(batches: &[RecordBatch], name: &str) -> Vec<i32> {
        batches
            .iter()
            .flat_map(|b| {
                let array = b.column_by_name(name).expect("column");
                let ints = array.as_any().downcast_ref::<Int32Array>().expect("int32");
                ints.iter().map(|v| v.expect("non-null")).collect::<Vec<_>>()
            })
            .collect()
    }

    #[tokio::test]
    async fn time_parts_match_utc_calendar() {
        let engine = engine();
        let ts = 1_541_121_934_796_i64;
        let frame = engine
            .with_time_parts(ts_frame(&engine, vec![ts]), "ts")
            .expect("time parts");
        let batches = engine.collect(frame).await.expect("collect");

        let expected = Utc.timestamp_millis_opt(ts).single().expect("valid instant");
        let weekday = i32::try_from(expected.weekday().number_from_sunday()).expect("weekday");
        let week = i32::try_from(expected.iso_week().week()).expect("week");
        let hour = i32::try_from(expected.hour()).expect("hour");
        let day = i32::try_from(expected.day()).expect("day");
        let month = i32::try_from(expected.month()).expect("month");

        assert_eq!(int_column(&batches, "hour"), vec![hour]);
        assert_eq!(int_column(&batches, "day"), vec![day]);
        assert_eq!(int_column(&batches, "week"), vec![week]);
        assert_eq!(int_column(&batches, "month"), vec![month]);
        assert_eq!(int_column(&batches, "year"), vec![expected.year()]);
        assert_eq!(int_column(&batches, "weekday"), vec![weekday]);

        // 2018-11-02T01:25:34.796Z, a Friday
        assert_eq!(int_column(&batches, "hour"), vec![1]);
        assert_eq!(int_column(&batches, "weekday"), vec![6]);
        assert_eq!(int_column(&batches, "week"), vec![44]);
    }

    #[tokio::test]
    async fn time_parts_keep_epoch_value() {
        let engine = engine();
        let frame = engine
            .with_time_parts(ts_frame(&engine, vec![1_000_000, 1_000_000]), "ts")
            .expect("time parts");
        let names = engine.column_names(&frame);
        assert_eq!(
            names,
            vec!["ts", "start_time", "hour", "day", "week", "month", "year", "weekday"]
        );

        let batches = engine.collect(frame).await.expect("collect");
        let ts: Vec<i64> = batches
            .iter()
            .flat_map(|b| {
                let array = b.column_by_name("ts").expect("ts");
                let ints = array.as_any().downcast_ref::<Int64Array>().expect("int64");
                ints.values().to_vec()
            })
            .collect();
        assert_eq!(ts, vec![1_000_000, 1_000_000]);
        assert_eq!(int_column(&batches, "year"), vec![1970, 1970]);
    }

    fn string_frame(engine: &DataFusionEngine, columns: &[(&str, Vec<Option<&str>>)]) -> DataFrame {
        let schema = Arc::new(Schema::new(
            columns
                .iter()
                .map(|(name, _)| Field::new(*name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));
        let arrays = columns
            .iter()
            .map(|(_, values)| Arc::new(StringArray::from(values.clone())) as ArrayRef)
            .collect();
        let batch = RecordBatch::try_new(schema, arrays).expect("batch");
        engine.session().read_batch(batch).expect("frame")
    }

    #[tokio::test]
    async fn first_row_per_key_keeps_whole_rows() {
        let engine = engine();
        let frame = string_frame(
            &engine,
            &[
                ("k", vec![Some("a"), Some("a"), Some("b")]),
                ("v", vec![Some("S2"), Some("S1"), Some("S3")]),
                ("w", vec![Some("A1"), Some("A2"), Some("A3")]),
            ],
        );

        let reduced = engine
            .first_row_per_key(frame, &["k"], &["v", "w"])
            .expect("reduce");
        assert_eq!(engine.count(reduced.clone()).await.expect("count"), 2);

        let filtered = engine
            .filter(reduced, Predicate::Equals("k", "a"))
            .expect("filter");
        let batches = engine.collect(filtered).await.expect("collect");
        assert_eq!(
            string_rows(&batches, &["v", "w"]),
            vec![vec![Some("S1".to_string()), Some("A2".to_string())]]
        );
    }

    #[tokio::test]
    async fn mixed_case_columns_filter_and_write() {
        let engine = engine();
        let lake = LakeFixture::new();
        let output = Namespace::open(
            lake.output_root().to_str().expect("utf8"),
            &StorageCredentials::default(),
        )
        .expect("output root");
        let frame = string_frame(
            &engine,
            &[
                ("userId", vec![Some("U1"), None]),
                ("firstName", vec![Some("Ada"), Some("Bob")]),
                ("lastName", vec![Some("Lovelace"), Some("Ross")]),
                ("gender", vec![Some("F"), Some("M")]),
                ("level", vec![Some("paid"), Some("free")]),
            ],
        );

        let frame = engine
            .filter(frame, Predicate::NotNull("userId"))
            .expect("filter");
        let destination = output.child(OutputTable::User.dir_name());
        let rows = engine
            .write_partitioned(frame, &destination, &[])
            .await
            .expect("write");
        assert_eq!(rows, 1);

        let read = engine
            .read_columnar(&destination, OutputTable::User)
            .await
            .expect("read");
        let batches = engine.collect(read).await.expect("collect");
        assert_eq!(
            string_rows(&batches, &["userId", "firstName", "level"]),
            vec![vec![
                Some("U1".to_string()),
                Some("Ada".to_string()),
                Some("paid".to_string()),
            ]]
        );
    }

    #[tokio::test]
    async fn empty_file_list_reads_declared_schema() {
        let engine = engine();
        let schema = playlake_core::schema_for(playlake_core::RecordKind::Catalog);
        let frame = engine.read_structured(&[], &schema).await.expect("read");

        assert_eq!(engine.column_names(&frame).len(), schema.fields().len());
        assert_eq!(engine.count(frame).await.expect("count"), 0);
    }

    #[test]
    fn json_decode_failure_is_schema_violation() {
        let err = DataFusionError::ArrowError(
            ArrowError::JsonError("failed to parse \"abc\" as Int64".to_string()),
            None,
        );
        let mapped = map_engine_error("read event records", err);
        assert!(mapped.is_schema_violation());
    }

    #[test]
    fn wrapped_decode_failure_is_schema_violation() {
        let inner = DataFusionError::ArrowError(
            ArrowError::JsonError("expected string got 5".to_string()),
            None,
        );
        let err = DataFusionError::Context("write song".to_string(), Box::new(inner));
        assert!(map_engine_error("write", err).is_schema_violation());
    }

    #[test]
    fn object_store_failure_is_storage_error() {
        let err = DataFusionError::ObjectStore(object_store::Error::Generic {
            store: "S3",
            source: "access denied".into(),
        });
        let mapped = map_engine_error("write songplay", err);
        assert!(matches!(mapped, Error::Storage { .. }));
    }

    #[test]
    fn storage_message_mentioning_parsing_is_storage_error() {
        let err = DataFusionError::ObjectStore(object_store::Error::Generic {
            store: "S3",
            source: "failed to parse XML response".into(),
        });
        let mapped = map_engine_error("list songs", err);
        assert!(matches!(mapped, Error::Storage { .. }));
    }

    #[test]
    fn plan_message_mentioning_parsing_is_engine_error() {
        let err = DataFusionError::Plan("failed to parse partition path".to_string());
        let mapped = map_engine_error("read table", err);
        assert!(matches!(mapped, Error::Engine { .. }));
    }

    #[test]
    fn flattened_decode_failure_is_schema_violation() {
        let err = DataFusionError::Execution(
            "Arrow error: Json error: whilst decoding field 'ts'".to_string(),
        );
        assert!(map_engine_error("write time", err).is_schema_violation());
    }

    #[test]
    fn plan_failure_is_engine_error() {
        let err = DataFusionError::Plan("no field named nope".to_string());
        let mapped = map_engine_error("select", err);
        assert!(matches!(mapped, Error::Engine { .. }));
    }

    #[test]
    fn write_result_rows_are_summed() {
        let schema = Arc::new(Schema::new(vec![Field::new("count", DataType::UInt64, false)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(UInt64Array::from(vec![3, 4]))])
            .expect("batch");
        assert_eq!(rows_in_write_result(&[batch]), 7);
    }
}
