//! Schema registry for raw input records.
//!
//! Declares the fixed field layouts of the two raw record types. The layouts
//! are advisory to the reading layer: fields missing from a raw record read as
//! null, present fields are coerced to the declared type and a value that
//! cannot be coerced fails the read.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef};

use crate::error::{Error, Result};

/// Raw record types understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Song catalog records (one song plus its artist per record).
    Catalog,
    /// Activity log records emitted by the player.
    Event,
}

impl RecordKind {
    /// Returns the registry identifier for this record kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "catalog" => Ok(Self::Catalog),
            "event" => Ok(Self::Event),
            other => Err(Error::configuration(format!(
                "unknown record type '{other}' (expected 'catalog' or 'event')"
            ))),
        }
    }
}

/// Semantic type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    /// UTF-8 text.
    String,
    /// 16-bit signed integer.
    SmallInt,
    /// 32-bit signed integer.
    Int,
    /// 64-bit signed integer.
    Long,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
}

impl SemanticType {
    /// Returns the Arrow type used to materialize this semantic type.
    #[must_use]
    pub const fn arrow_type(self) -> DataType {
        match self {
            Self::String => DataType::Utf8,
            Self::SmallInt => DataType::Int16,
            Self::Int => DataType::Int32,
            Self::Long => DataType::Int64,
            Self::Float => DataType::Float32,
            Self::Double => DataType::Float64,
        }
    }
}

/// One declared field: name, semantic type and nullability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as it appears in the raw records.
    pub name: &'static str,
    /// Declared semantic type.
    pub semantic_type: SemanticType,
    /// Whether the field may be null.
    pub nullable: bool,
}

impl FieldSpec {
    const fn nullable(name: &'static str, semantic_type: SemanticType) -> Self {
        Self {
            name,
            semantic_type,
            nullable: true,
        }
    }

    /// Converts the declaration into an Arrow field.
    #[must_use]
    pub fn to_arrow(&self) -> Field {
        Field::new(self.name, self.semantic_type.arrow_type(), self.nullable)
    }
}

/// Ordered field layout of one raw record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    kind: RecordKind,
    fields: &'static [FieldSpec],
}

impl RecordSchema {
    /// Returns the record kind this schema describes.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Returns the declared fields in order.
    #[must_use]
    pub const fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Looks up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the Arrow schema used by the reading layer.
    #[must_use]
    pub fn to_arrow(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.fields.iter().map(FieldSpec::to_arrow).collect::<Vec<_>>(),
        ))
    }
}

// Every raw field is nullable: an absent JSON key reads as null.
const CATALOG_FIELDS: &[FieldSpec] = &[
    FieldSpec::nullable("num_songs", SemanticType::Int),
    FieldSpec::nullable("artist_id", SemanticType::String),
    FieldSpec::nullable("artist_latitude", SemanticType::Float),
    FieldSpec::nullable("artist_longitude", SemanticType::Float),
    FieldSpec::nullable("artist_location", SemanticType::String),
    FieldSpec::nullable("artist_name", SemanticType::String),
    FieldSpec::nullable("song_id", SemanticType::String),
    FieldSpec::nullable("title", SemanticType::String),
    FieldSpec::nullable("duration", SemanticType::Float),
    FieldSpec::nullable("year", SemanticType::SmallInt),
];

const EVENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::nullable("artist", SemanticType::String),
    FieldSpec::nullable("auth", SemanticType::String),
    FieldSpec::nullable("firstName", SemanticType::String),
    FieldSpec::nullable("gender", SemanticType::String),
    FieldSpec::nullable("itemInSession", SemanticType::Long),
    FieldSpec::nullable("lastName", SemanticType::String),
    FieldSpec::nullable("length", SemanticType::Float),
    FieldSpec::nullable("level", SemanticType::String),
    FieldSpec::nullable("location", SemanticType::String),
    FieldSpec::nullable("method", SemanticType::String),
    FieldSpec::nullable("page", SemanticType::String),
    FieldSpec::nullable("registration", SemanticType::Double),
    FieldSpec::nullable("sessionId", SemanticType::Long),
    FieldSpec::nullable("song", SemanticType::String),
    FieldSpec::nullable("status", SemanticType::Long),
    FieldSpec::nullable("ts", SemanticType::Long),
    FieldSpec::nullable("userAgent", SemanticType::String),
    FieldSpec::nullable("userId", SemanticType::String),
];

/// Returns the declared schema for a record kind.
#[must_use]
pub const fn schema_for(kind: RecordKind) -> RecordSchema {
    match kind {
        RecordKind::Catalog => RecordSchema {
            kind,
            fields: CATALOG_FIELDS,
        },
        RecordKind::Event => RecordSchema {
            kind,
            fields: EVENT_FIELDS,
        },
    }
}

/// Resolves a record-type identifier (`catalog` or `event`) to its schema.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for unknown identifiers.
pub fn lookup(identifier: &str) -> Result<RecordSchema> {
    identifier.parse().map(schema_for)
}
