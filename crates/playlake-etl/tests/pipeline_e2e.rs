//! End-to-end pipeline tests against a local lake.
//!
//! Each test writes raw NDJSON below a temporary input root, runs the whole
//! pipeline and reads the persisted tables back.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use arrow::record_batch::RecordBatch;
use playlake_core::{Compression, Namespace, OutputTable, StorageCredentials};
use playlake_etl::{DataFusionEngine, TableEngine, run};
use playlake_test_utils::{
    CatalogRecordFixture, EventRecordFixture, LakeFixture, assert_no_nulls, column_values,
    init_test_logging, partition_dirs, relative_files, string_rows, total_rows,
};

async fn read_table(lake: &LakeFixture, table: OutputTable) -> Vec<RecordBatch> {
    let engine = DataFusionEngine::new(Compression::Snappy);
    let output = Namespace::open(
        lake.output_root().to_str().expect("utf8"),
        &StorageCredentials::default(),
    )
    .expect("output root");
    let frame = engine
        .read_columnar(&output.child(table.dir_name()), table)
        .await
        .expect("read table");
    engine.collect(frame).await.expect("collect")
}

fn reference_lake() -> LakeFixture {
    let lake = LakeFixture::new();
    lake.write_catalog(
        "A/A/A/TRAAAAW128F429D538.json",
        &[CatalogRecordFixture::song("S1", "T1", "A1", "AR1")],
    );
    lake.write_events(
        "2018/11/2018-11-01-events.json",
        &[EventRecordFixture::play("U1", 1_000_000, "T1", "AR1", 180.0)],
    );
    lake
}

#[tokio::test]
async fn reference_play_matches_catalog_song() {
    init_test_logging();
    let lake = reference_lake();

    let report = run(&lake.config()).await.expect("run");

    assert_eq!(report.catalog_files, 1);
    assert_eq!(report.event_files, 1);
    assert_eq!(report.songs, 1);
    assert_eq!(report.artists, 1);
    assert_eq!(report.songplays, 1);

    let songplays = read_table(&lake, OutputTable::SongPlay).await;
    assert_eq!(
        string_rows(
            &songplays,
            &["song_id", "artist_id", "userId", "sessionId", "year", "month"]
        ),
        vec![vec![
            Some("S1".to_string()),
            Some("A1".to_string()),
            Some("U1".to_string()),
            Some("5".to_string()),
            Some("1970".to_string()),
            Some("1".to_string()),
        ]]
    );
    assert_eq!(
        partition_dirs(&lake.table_dir(OutputTable::SongPlay)),
        vec!["year=1970/month=1".to_string()]
    );
}

#[tokio::test]
async fn all_five_tables_are_written() {
    let lake = reference_lake();

    run(&lake.config()).await.expect("run");

    for table in OutputTable::ALL {
        let batches = read_table(&lake, table).await;
        assert_eq!(total_rows(&batches), 1, "{table}");
    }
}

#[tokio::test]
async fn play_matches_on_catalog_duration() {
    let lake = LakeFixture::new();
    lake.write_catalog(
        "A/A/A/songs.json",
        &[
            CatalogRecordFixture::song("S1", "T1", "A1", "AR1").with_duration(200.5),
            CatalogRecordFixture::song("S2", "T1", "A1", "AR1"),
        ],
    );
    lake.write_events(
        "2018/11/events.json",
        &[
            EventRecordFixture::play("U1", 1_000_000, "T1", "AR1", 200.5),
            EventRecordFixture::play("U2", 2_000_000, "T1", "AR1", 180.0),
        ],
    );

    run(&lake.config()).await.expect("run");

    let songplays = read_table(&lake, OutputTable::SongPlay).await;
    assert_eq!(
        string_rows(&songplays, &["userId", "song_id"]),
        vec![
            vec![Some("U1".to_string()), Some("S1".to_string())],
            vec![Some("U2".to_string()), Some("S2".to_string())],
        ]
    );
}

#[tokio::test]
async fn non_play_pages_are_excluded_everywhere() {
    let lake = LakeFixture::new();
    lake.write_catalog(
        "A/B/C/songs.json",
        &[CatalogRecordFixture::song("S1", "T1", "A1", "AR1")],
    );
    lake.write_events(
        "2018/11/day-1.json",
        &[
            EventRecordFixture::play("U1", 1_541_121_934_796, "T1", "AR1", 180.0),
            EventRecordFixture::page("U2", 1_541_121_940_000, "Home"),
            EventRecordFixture::page("U3", 1_541_121_950_000, "Logout"),
        ],
    );
    lake.write_events(
        "2018/11/day-2.json",
        &[
            EventRecordFixture::play("U4", 1_541_208_334_796, "T9", "AR9", 99.0),
            EventRecordFixture::page("U4", 1_541_208_340_000, "Settings"),
        ],
    );

    let report = run(&lake.config()).await.expect("run");
    assert_eq!(report.event_files, 2);
    assert_eq!(report.users, 2);
    assert_eq!(report.time, 2);
    assert_eq!(report.songplays, 2);

    let users = read_table(&lake, OutputTable::User).await;
    let mut ids: Vec<_> = column_values(&users, "userId").into_iter().flatten().collect();
    ids.sort();
    assert_eq!(ids, vec!["U1".to_string(), "U4".to_string()]);

    let time = read_table(&lake, OutputTable::Time).await;
    let mut ts: Vec<_> = column_values(&time, "ts").into_iter().flatten().collect();
    ts.sort();
    assert_eq!(
        ts,
        vec!["1541121934796".to_string(), "1541208334796".to_string()]
    );
}

#[tokio::test]
async fn unmatched_play_survives_with_null_ids() {
    let lake = LakeFixture::new();
    lake.write_catalog(
        "A/B/C/songs.json",
        &[CatalogRecordFixture::song("S1", "T1", "A1", "AR1")],
    );
    lake.write_events(
        "2018/11/events.json",
        &[
            EventRecordFixture::play("U1", 1_000_000, "T1", "AR1", 180.0),
            EventRecordFixture::play("U2", 2_000_000, "T1", "AR1", 181.0),
            EventRecordFixture::play("U3", 3_000_000, "Unknown Song", "Nobody", 180.0),
        ],
    );

    let report = run(&lake.config()).await.expect("run");
    assert_eq!(report.songplays, 3);

    let songplays = read_table(&lake, OutputTable::SongPlay).await;
    assert_eq!(
        string_rows(&songplays, &["userId", "song_id", "artist_id"]),
        vec![
            vec![
                Some("U1".to_string()),
                Some("S1".to_string()),
                Some("A1".to_string())
            ],
            vec![Some("U2".to_string()), None, None],
            vec![Some("U3".to_string()), None, None],
        ]
    );
}

#[tokio::test]
async fn song_and_artist_keys_are_never_null() {
    let lake = LakeFixture::new();
    lake.write_catalog(
        "A/A/A/one.json",
        &[
            CatalogRecordFixture::song("S1", "T1", "A1", "AR1"),
            CatalogRecordFixture::song("S2", "T2", "A2", "AR2").without_song_id(),
            CatalogRecordFixture::song("S3", "T3", "A3", "AR3").without_artist_id(),
        ],
    );

    let report = run(&lake.config()).await.expect("run");
    assert_eq!(report.songs, 2);
    assert_eq!(report.artists, 2);

    assert_no_nulls(&read_table(&lake, OutputTable::Song).await, "song_id");
    assert_no_nulls(&read_table(&lake, OutputTable::Artist).await, "artist_id");
}

#[tokio::test]
async fn rerun_overwrites_previous_output() {
    let lake = reference_lake();

    let first = run(&lake.config()).await.expect("first run");
    let files_after_first = relative_files(&lake.output_root()).len();
    let second = run(&lake.config()).await.expect("second run");

    assert_ne!(first.run_id, second.run_id);
    for table in OutputTable::ALL {
        assert_eq!(first.rows_written(table), second.rows_written(table), "{table}");
        assert_eq!(
            total_rows(&read_table(&lake, table).await),
            1,
            "{table} was appended to"
        );
    }
    assert_eq!(
        relative_files(&lake.output_root()).len(),
        files_after_first
    );
}

#[tokio::test]
async fn schema_violation_aborts_run() {
    let lake = reference_lake();
    lake.write_raw(
        "log_data/2018/11/broken.json",
        "{\"page\":\"NextSong\",\"ts\":\"not-a-timestamp\",\"userId\":\"U7\"}\n",
    );

    let err = run(&lake.config()).await.unwrap_err();

    assert!(err.is_schema_violation(), "unexpected error: {err}");
    assert!(!lake.table_dir(OutputTable::SongPlay).exists());
}

#[tokio::test]
async fn missing_input_yields_empty_tables() {
    let lake = LakeFixture::new();
    lake.write_events(
        "2018/11/events.json",
        &[EventRecordFixture::play("U1", 1_000_000, "T1", "AR1", 180.0)],
    );

    let report = run(&lake.config()).await.expect("run");

    assert_eq!(report.catalog_files, 0);
    assert_eq!(report.songs, 0);
    assert_eq!(report.artists, 0);
    assert_eq!(report.songplays, 1);

    let songplays = read_table(&lake, OutputTable::SongPlay).await;
    assert_eq!(column_values(&songplays, "song_id"), vec![None]);
}
