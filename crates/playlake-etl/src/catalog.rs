//! Catalog stage: song and artist dimensions.
//!
//! Catalog records carry one song and its artist each. Both dimensions are
//! projections of the same records, keyed by a non-null id and deduplicated
//! on whole rows.

use playlake_core::{Namespace, OutputTable, RecordKind, Result, schema_for};

use crate::engine::{Predicate, TableEngine, persist};
use crate::metrics::record_input_files;

/// Rows produced by the catalog stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogOutput {
    /// Raw catalog files read.
    pub files: usize,
    /// Rows written to the song table.
    pub songs: u64,
    /// Rows written to the artist table.
    pub artists: u64,
}

/// Reads every catalog record below `source`, at any nesting depth.
///
/// Returns the frame and the number of files it covers.
///
/// # Errors
///
/// Returns an error if listing fails or the engine rejects the read.
pub async fn read_catalog<E: TableEngine>(
    engine: &E,
    source: &Namespace,
) -> Result<(E::Frame, usize)> {
    let files = source.list_files("json").await?;
    record_input_files(RecordKind::Catalog.as_str(), files.len());
    tracing::info!(files = files.len(), location = %source.url(), "reading catalog records");

    let frame = engine
        .read_structured(&files, &schema_for(RecordKind::Catalog))
        .await?;
    Ok((frame, files.len()))
}

/// Builds the song dimension: one row per distinct song with a non-null id.
///
/// # Errors
///
/// Returns an error if the engine cannot plan the projection.
pub fn extract_songs<E: TableEngine>(engine: &E, catalog: E::Frame) -> Result<E::Frame> {
    let songs = engine.select(catalog, &OutputTable::Song.column_names())?;
    let songs = engine.filter(songs, Predicate::NotNull("song_id"))?;
    engine.drop_duplicates(songs)
}

/// Builds the artist dimension: one row per distinct artist with a non-null id.
///
/// # Errors
///
/// Returns an error if the engine cannot plan the projection.
pub fn extract_artists<E: TableEngine>(engine: &E, catalog: E::Frame) -> Result<E::Frame> {
    let artists = engine.select(catalog, &OutputTable::Artist.column_names())?;
    let artists = engine.filter(artists, Predicate::NotNull("artist_id"))?;
    engine.drop_duplicates(artists)
}

/// Runs the catalog stage: reads `source` and writes the song and artist
/// tables below `output_root`.
///
/// # Errors
///
/// Returns the first read, schema or write failure.
pub async fn run<E: TableEngine>(
    engine: &E,
    source: &Namespace,
    output_root: &Namespace,
) -> Result<CatalogOutput> {
    let (catalog, files) = read_catalog(engine, source).await?;

    let songs = extract_songs(engine, catalog.clone())?;
    let songs = persist(engine, songs, output_root, OutputTable::Song).await?;

    let artists = extract_artists(engine, catalog)?;
    let artists = persist(engine, artists, output_root, OutputTable::Artist).await?;

    Ok(CatalogOutput {
        files,
        songs,
        artists,
    })
}
