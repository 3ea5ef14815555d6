//! Fact stage: the song-play table.
//!
//! Song and artist are read back from their persisted tables rather than
//! taken from the catalog stage in memory, so this stage only depends on
//! what is on storage.
//!
//! Plays are matched to the catalog on `(song, artist, length)` against
//! `(title, artist_name, duration)` with exact float equality. A play with
//! no match is kept with null `song_id` and `artist_id`.

use playlake_core::{Namespace, OutputTable, Result};

use crate::engine::{JoinKind, TableEngine, persist};

/// Join key of the song context, matched against play events.
pub const CONTEXT_KEY: [&str; 3] = ["title", "artist_name", "duration"];

/// Play-event columns matched against [`CONTEXT_KEY`], in the same order.
pub const PLAY_KEY: [&str; 3] = ["song", "artist", "length"];

// Artist-side key is renamed so both join inputs keep unique column names.
const ARTIST_JOIN_KEY: &str = "artist_key";

/// Joins songs with their artists.
///
/// The context holds one row per `(title, artist_name, duration)`; when the
/// catalog lists the same key more than once the joined row with the
/// smallest `(song_id, artist_id)` is kept, so joining plays against it never
/// multiplies rows.
///
/// # Errors
///
/// Returns an error if the engine cannot plan the join.
pub fn song_context<E: TableEngine>(
    engine: &E,
    songs: E::Frame,
    artists: E::Frame,
) -> Result<E::Frame> {
    let artists = engine.select(artists, &["artist_id", "artist_name"])?;
    let artists = engine.rename(artists, "artist_id", ARTIST_JOIN_KEY)?;

    let joined = engine.join(
        songs,
        artists,
        &[("artist_id", ARTIST_JOIN_KEY)],
        JoinKind::Inner,
    )?;
    let context = engine.select(
        joined,
        &["artist_id", "song_id", "duration", "artist_name", "title"],
    )?;
    engine.first_row_per_key(context, &CONTEXT_KEY, &["song_id", "artist_id"])
}

/// Left-joins timed play events against the song context and projects the
/// song-play columns.
///
/// # Errors
///
/// Returns an error if the engine cannot plan the join.
pub fn build_songplays<E: TableEngine>(
    engine: &E,
    timed_plays: E::Frame,
    context: E::Frame,
) -> Result<E::Frame> {
    let on: Vec<(&str, &str)> = PLAY_KEY.into_iter().zip(CONTEXT_KEY).collect();
    let joined = engine.join(timed_plays, context, &on, JoinKind::Left)?;
    engine.select(joined, &OutputTable::SongPlay.column_names())
}

/// Runs the fact stage: reads the persisted song and artist tables, builds
/// song plays from `timed_plays` and writes them below `output_root`.
///
/// # Errors
///
/// Returns the first read or write failure.
pub async fn run<E: TableEngine>(
    engine: &E,
    timed_plays: E::Frame,
    output_root: &Namespace,
) -> Result<u64> {
    let songs = engine
        .read_columnar(&output_root.child(OutputTable::Song.dir_name()), OutputTable::Song)
        .await?;
    let artists = engine
        .read_columnar(
            &output_root.child(OutputTable::Artist.dir_name()),
            OutputTable::Artist,
        )
        .await?;

    let context = song_context(engine, songs, artists)?;
    let songplays = build_songplays(engine, timed_plays, context)?;
    persist(engine, songplays, output_root, OutputTable::SongPlay).await
}
