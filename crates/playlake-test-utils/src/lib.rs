//! Shared test utilities for playlake integration tests.
//!
//! This crate provides:
//! - [`CatalogRecordFixture`] and [`EventRecordFixture`]: raw record builders
//! - [`LakeFixture`]: temporary input/output roots with nested NDJSON writers
//! - Assertion helpers for reading table contents as strings
//!
//! # Example
//!
//! ```rust,ignore
//! use playlake_test_utils::{CatalogRecordFixture, EventRecordFixture, LakeFixture};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let lake = LakeFixture::new();
//!     lake.write_catalog("A/B/C/TRAAA.json", &[CatalogRecordFixture::song("S1", "T1", "A1", "AR1")]);
//!     lake.write_events("2018/11/events.json", &[EventRecordFixture::play("U1", 1_000_000, "T1", "AR1", 180.0)]);
//!     let report = playlake_etl::run(&lake.config()).await.unwrap();
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("playlake_core=debug".parse().expect("valid directive"))
                .add_directive("playlake_etl=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
