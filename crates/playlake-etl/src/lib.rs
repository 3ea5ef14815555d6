//! # playlake-etl
//!
//! Turns raw song catalog records and player activity logs into a star
//! schema of partitioned Parquet tables:
//!
//! | Table | Source | Partitioned by |
//! |-------|--------|----------------|
//! | `song` | catalog records | `year`, `artist_id` |
//! | `artist` | catalog records | |
//! | `user` | play events | |
//! | `time` | play events | `year`, `month` |
//! | `songplay` | play events joined with song and artist | `year`, `month` |
//!
//! The stages are written against [`engine::TableEngine`]; the shipped
//! implementation is [`engine::DataFusionEngine`].
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn example() -> playlake_core::Result<()> {
//! let config = playlake_core::Config::load("dl.toml")?;
//! let report = playlake_etl::run(&config).await?;
//! println!("{} song plays", report.songplays);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod engine;
pub mod events;
pub mod fact;
pub mod metrics;
pub mod pipeline;

pub use engine::{DataFusionEngine, JoinKind, Predicate, TableEngine};
pub use pipeline::{RunContext, RunReport, run};
