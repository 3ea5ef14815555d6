//! Pre-built test fixtures for common test scenarios.
//!
//! Raw records serialize to the same JSON keys the upstream producers emit.
//! Unset optional fields are left out of the document entirely, which is how
//! a missing field shows up in real input.

use std::path::{Path, PathBuf};

use playlake_core::{Config, OutputTable};
use serde::Serialize;
use tempfile::TempDir;

/// One raw catalog record (a song and its artist).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogRecordFixture {
    /// Number of songs in the source file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_songs: Option<i32>,
    /// Artist key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<String>,
    /// Artist latitude.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_latitude: Option<f32>,
    /// Artist longitude.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_longitude: Option<f32>,
    /// Artist location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_location: Option<String>,
    /// Artist name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_name: Option<String>,
    /// Song key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_id: Option<String>,
    /// Song title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Song duration in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
    /// Release year.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i16>,
}

impl CatalogRecordFixture {
    /// Creates a catalog record with a 180 second duration released in 2000.
    pub fn song(song_id: &str, title: &str, artist_id: &str, artist_name: &str) -> Self {
        Self {
            num_songs: Some(1),
            artist_id: Some(artist_id.to_string()),
            artist_latitude: None,
            artist_longitude: None,
            artist_location: Some(String::new()),
            artist_name: Some(artist_name.to_string()),
            song_id: Some(song_id.to_string()),
            title: Some(title.to_string()),
            duration: Some(180.0),
            year: Some(2000),
        }
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Sets the release year.
    #[must_use]
    pub fn with_year(mut self, year: i16) -> Self {
        self.year = Some(year);
        self
    }

    /// Sets the artist location and coordinates.
    #[must_use]
    pub fn with_artist_location(mut self, location: &str, latitude: f32, longitude: f32) -> Self {
        self.artist_location = Some(location.to_string());
        self.artist_latitude = Some(latitude);
        self.artist_longitude = Some(longitude);
        self
    }

    /// Removes the song key.
    #[must_use]
    pub fn without_song_id(mut self) -> Self {
        self.song_id = None;
        self
    }

    /// Removes the artist key.
    #[must_use]
    pub fn without_artist_id(mut self) -> Self {
        self.artist_id = None;
        self
    }
}

/// One raw activity log record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecordFixture {
    /// Artist of the played song.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    /// Authentication state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    /// User first name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// User gender.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Position of the event in its session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_in_session: Option<i64>,
    /// User last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Length of the played song in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<f32>,
    /// Subscription level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// User location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// HTTP method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Action discriminator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Registration timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration: Option<f64>,
    /// Session key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    /// Title of the played song.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<String>,
    /// HTTP status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    /// Event time in epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    /// Client user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// User key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl EventRecordFixture {
    /// Creates a `NextSong` event for a free user in session 5.
    pub fn play(user_id: &str, ts: i64, song: &str, artist: &str, length: f32) -> Self {
        Self {
            artist: Some(artist.to_string()),
            song: Some(song.to_string()),
            length: Some(length),
            ..Self::page(user_id, ts, "NextSong")
        }
    }

    /// Creates an event for an arbitrary page with no song attached.
    pub fn page(user_id: &str, ts: i64, page: &str) -> Self {
        Self {
            artist: None,
            auth: Some("Logged In".to_string()),
            first_name: Some("Ada".to_string()),
            gender: Some("F".to_string()),
            item_in_session: Some(0),
            last_name: Some("Lovelace".to_string()),
            length: None,
            level: Some("free".to_string()),
            location: Some("X".to_string()),
            method: Some("PUT".to_string()),
            page: Some(page.to_string()),
            registration: Some(1_540_919_166_796.0),
            session_id: Some(5),
            song: None,
            status: Some(200),
            ts: Some(ts),
            user_agent: Some("UA".to_string()),
            user_id: Some(user_id.to_string()),
        }
    }

    /// Sets the subscription level.
    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = Some(level.to_string());
        self
    }

    /// Sets the user's names and gender.
    #[must_use]
    pub fn with_user(mut self, first_name: &str, last_name: &str, gender: &str) -> Self {
        self.first_name = Some(first_name.to_string());
        self.last_name = Some(last_name.to_string());
        self.gender = Some(gender.to_string());
        self
    }

    /// Sets the session key.
    #[must_use]
    pub fn with_session(mut self, session_id: i64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Removes the user key.
    #[must_use]
    pub fn without_user_id(mut self) -> Self {
        self.user_id = None;
        self
    }
}

/// Serializes records as newline-delimited JSON.
pub fn to_ndjson<T: Serialize>(records: &[T]) -> String {
    records
        .iter()
        .map(|r| serde_json::to_string(r).expect("serialize record"))
        .map(|line| line + "\n")
        .collect()
}

/// Temporary input and output roots for one pipeline run.
pub struct LakeFixture {
    dir: TempDir,
}

impl LakeFixture {
    /// Creates empty `input/` and `output/` roots in a fresh directory.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        std::fs::create_dir_all(dir.path().join("input")).expect("create input root");
        std::fs::create_dir_all(dir.path().join("output")).expect("create output root");
        Self { dir }
    }

    /// Returns the input root.
    pub fn input_root(&self) -> PathBuf {
        self.dir.path().join("input")
    }

    /// Returns the output root.
    pub fn output_root(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    /// Returns the directory of a persisted table.
    pub fn table_dir(&self, table: OutputTable) -> PathBuf {
        self.output_root().join(table.dir_name())
    }

    /// Returns a configuration pointing at this fixture's roots.
    pub fn config(&self) -> Config {
        Config::new(path_str(&self.input_root()), path_str(&self.output_root()))
    }

    /// Writes catalog records to `song-data/{relative}`.
    pub fn write_catalog(&self, relative: &str, records: &[CatalogRecordFixture]) -> PathBuf {
        self.write_raw(&format!("song-data/{relative}"), &to_ndjson(records))
    }

    /// Writes event records to `log_data/{relative}`.
    pub fn write_events(&self, relative: &str, records: &[EventRecordFixture]) -> PathBuf {
        self.write_raw(&format!("log_data/{relative}"), &to_ndjson(records))
    }

    /// Writes an arbitrary file below the input root.
    pub fn write_raw(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.input_root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create input directories");
        }
        std::fs::write(&path, contents).expect("write input file");
        path
    }
}

impl Default for LakeFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn path_str(path: &Path) -> String {
    path.to_str().expect("utf8 path").to_string()
}
