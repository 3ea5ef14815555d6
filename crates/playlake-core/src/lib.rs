//! # playlake-core
//!
//! Shared primitives for the playlake star-schema pipeline.
//!
//! - **Configuration**: the `dl.toml` document and credential injection
//! - **Schema registry**: declared layouts of the raw catalog and event records
//! - **Output tables**: columns and partitioning of the five star-schema tables
//! - **Storage**: local and S3 namespaces shared by readers and writers
//! - **Observability**: logging setup, run spans and secret redaction
//! - **Error types**: the failure classes that abort a run
//!
//! ## Example
//!
//! ```rust
//! use playlake_core::prelude::*;
//!
//! let schema = schema_for(RecordKind::Event);
//! assert_eq!(schema.field("ts").map(|f| f.semantic_type), Some(SemanticType::Long));
//!
//! assert_eq!(OutputTable::SongPlay.partition_columns(), &["year", "month"]);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod id;
pub mod observability;
pub mod schema;
pub mod storage;
pub mod tables;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{Compression, Config, StorageCredentials};
    pub use crate::error::{Error, Result};
    pub use crate::id::RunId;
    pub use crate::schema::{FieldSpec, RecordKind, RecordSchema, SemanticType, schema_for};
    pub use crate::storage::Namespace;
    pub use crate::tables::{NULL_PARTITION_VALUE, OutputTable};
}

pub use config::{Compression, Config, DEFAULT_CONFIG_PATH, StorageCredentials};
pub use error::{Error, Result};
pub use id::RunId;
pub use observability::{LogFormat, Redacted, init_logging};
pub use schema::{RecordKind, RecordSchema, SemanticType, schema_for};
pub use storage::Namespace;
pub use tables::{NULL_PARTITION_VALUE, OutputTable};
