//! Output table layouts.
//!
//! The star schema written by a run:
//!
//! ```text
//! {output_root}/
//! ├── song/       year=…/artist_id=…/*.parquet
//! ├── artist/     *.parquet
//! ├── user/       *.parquet
//! ├── time/       year=…/month=…/*.parquet
//! └── songplay/   year=…/month=…/*.parquet
//! ```
//!
//! Each table declares its columns in output order together with its
//! partition columns. Partition columns are part of the logical table even
//! though the columnar files do not carry them.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};

use crate::schema::{FieldSpec, SemanticType};

/// Directory value used for a null partition value.
pub const NULL_PARTITION_VALUE: &str = "__HIVE_DEFAULT_PARTITION__";

/// The five tables of the star schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputTable {
    /// Song dimension.
    Song,
    /// Artist dimension.
    Artist,
    /// User dimension.
    User,
    /// Time dimension.
    Time,
    /// Song-play fact table.
    SongPlay,
}

const fn field(name: &'static str, semantic_type: SemanticType, nullable: bool) -> FieldSpec {
    FieldSpec {
        name,
        semantic_type,
        nullable,
    }
}

const SONG_FIELDS: &[FieldSpec] = &[
    field("song_id", SemanticType::String, false),
    field("title", SemanticType::String, true),
    field("artist_id", SemanticType::String, true),
    field("year", SemanticType::SmallInt, true),
    field("duration", SemanticType::Float, true),
];

const ARTIST_FIELDS: &[FieldSpec] = &[
    field("artist_id", SemanticType::String, false),
    field("artist_name", SemanticType::String, true),
    field("artist_location", SemanticType::String, true),
    field("artist_latitude", SemanticType::Float, true),
    field("artist_longitude", SemanticType::Float, true),
];

const USER_FIELDS: &[FieldSpec] = &[
    field("userId", SemanticType::String, false),
    field("firstName", SemanticType::String, true),
    field("lastName", SemanticType::String, true),
    field("gender", SemanticType::String, true),
    field("level", SemanticType::String, true),
];

const TIME_FIELDS: &[FieldSpec] = &[
    field("ts", SemanticType::Long, true),
    field("hour", SemanticType::Int, true),
    field("day", SemanticType::Int, true),
    field("week", SemanticType::Int, true),
    field("month", SemanticType::Int, true),
    field("year", SemanticType::Int, true),
    field("weekday", SemanticType::Int, true),
];

const SONGPLAY_FIELDS: &[FieldSpec] = &[
    field("ts", SemanticType::Long, true),
    field("userId", SemanticType::String, true),
    field("level", SemanticType::String, true),
    field("song_id", SemanticType::String, true),
    field("artist_id", SemanticType::String, true),
    field("sessionId", SemanticType::Long, true),
    field("location", SemanticType::String, true),
    field("userAgent", SemanticType::String, true),
    field("year", SemanticType::Int, true),
    field("month", SemanticType::Int, true),
];

impl OutputTable {
    /// All tables in the order a run writes them.
    pub const ALL: [Self; 5] = [
        Self::Song,
        Self::Artist,
        Self::User,
        Self::Time,
        Self::SongPlay,
    ];

    /// Returns the directory name under the output root.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Song => "song",
            Self::Artist => "artist",
            Self::User => "user",
            Self::Time => "time",
            Self::SongPlay => "songplay",
        }
    }

    /// Returns the declared columns in output order.
    #[must_use]
    pub const fn fields(self) -> &'static [FieldSpec] {
        match self {
            Self::Song => SONG_FIELDS,
            Self::Artist => ARTIST_FIELDS,
            Self::User => USER_FIELDS,
            Self::Time => TIME_FIELDS,
            Self::SongPlay => SONGPLAY_FIELDS,
        }
    }

    /// Returns the partition columns, outermost directory first.
    #[must_use]
    pub const fn partition_columns(self) -> &'static [&'static str] {
        match self {
            Self::Song => &["year", "artist_id"],
            Self::Time | Self::SongPlay => &["year", "month"],
            Self::Artist | Self::User => &[],
        }
    }

    /// Returns true if `column` is a partition column of this table.
    #[must_use]
    pub fn is_partition_column(self, column: &str) -> bool {
        self.partition_columns().contains(&column)
    }

    /// Returns the declared column names in output order.
    #[must_use]
    pub fn column_names(self) -> Vec<&'static str> {
        self.fields().iter().map(|f| f.name).collect()
    }

    /// Returns the Arrow schema of the logical table.
    #[must_use]
    pub fn arrow_schema(self) -> SchemaRef {
        // Declared nullability documents the table invariants; the physical
        // schema stays nullable so empty and partition-restored frames line up.
        Arc::new(Schema::new(
            self.fields()
                .iter()
                .map(|f| FieldSpec {
                    nullable: true,
                    ..*f
                })
                .map(|f| f.to_arrow())
                .collect::<Vec<_>>(),
        ))
    }
}

impl fmt::Display for OutputTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}
