//! Pipeline configuration.
//!
//! A single TOML key-value file read once at startup:
//!
//! ```toml
//! input_root = "s3a://example-bucket/"
//! output_root = "/data/lake"
//!
//! [credentials]
//! aws_access_key_id = "..."
//! aws_secret_access_key = "..."
//! ```
//!
//! Credentials the file leaves out are injected from `AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY` and `AWS_REGION`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::observability::{LogFormat, Redacted};

/// Default configuration file, resolved against the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "dl.toml";

/// Compression codec for columnar output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression.
    Uncompressed,
    /// Snappy.
    #[default]
    Snappy,
    /// Zstandard at its default level.
    Zstd,
}

impl Compression {
    /// Returns the codec string understood by the Parquet writer.
    #[must_use]
    pub const fn as_parquet_codec(self) -> &'static str {
        match self {
            Self::Uncompressed => "uncompressed",
            Self::Snappy => "snappy",
            Self::Zstd => "zstd(3)",
        }
    }
}

/// Access credentials for the storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageCredentials {
    /// Access key id.
    #[serde(default)]
    pub aws_access_key_id: Option<Redacted<String>>,
    /// Secret access key.
    #[serde(default)]
    pub aws_secret_access_key: Option<Redacted<String>>,
    /// Region of the bucket, if not the backend default.
    #[serde(default)]
    pub region: Option<String>,
}

impl StorageCredentials {
    /// Fills credentials missing from the file with environment values.
    #[must_use]
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback(|name| std::env::var(name).ok())
    }

    fn with_fallback(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if self.aws_access_key_id.is_none() {
            self.aws_access_key_id = non_empty("AWS_ACCESS_KEY_ID").map(Redacted::new);
        }
        if self.aws_secret_access_key.is_none() {
            self.aws_secret_access_key = non_empty("AWS_SECRET_ACCESS_KEY").map(Redacted::new);
        }
        if self.region.is_none() {
            self.region = non_empty("AWS_REGION");
        }
        self
    }
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the raw input namespace.
    pub input_root: String,

    /// Root of the output namespace; tables are written beneath it.
    pub output_root: String,

    /// Subdirectory of `input_root` holding catalog records.
    #[serde(default = "default_catalog_dir")]
    pub catalog_dir: String,

    /// Subdirectory of `input_root` holding event records.
    #[serde(default = "default_event_dir")]
    pub event_dir: String,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Compression codec for the columnar output.
    #[serde(default)]
    pub compression: Compression,

    /// Storage backend credentials.
    #[serde(default)]
    pub credentials: StorageCredentials,
}

fn default_catalog_dir() -> String {
    "song-data".to_string()
}

fn default_event_dir() -> String {
    "log_data".to_string()
}

impl Config {
    /// Creates a configuration with default settings for the given roots.
    #[must_use]
    pub fn new(input_root: impl Into<String>, output_root: impl Into<String>) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            catalog_dir: default_catalog_dir(),
            event_dir: default_event_dir(),
            log_format: LogFormat::default(),
            compression: Compression::default(),
            credentials: StorageCredentials::default(),
        }
    }

    /// Parses and validates a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the document is not valid TOML,
    /// misses a required key or fails validation.
    pub fn from_toml_str(document: &str) -> Result<Self> {
        let config: Self = toml::from_str(document)
            .map_err(|e| Error::configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration file and injects environment credentials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&document)?;
        config.credentials = config.credentials.with_env_fallback();
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when a root or subdirectory is empty.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("input_root", &self.input_root),
            ("output_root", &self.output_root),
            ("catalog_dir", &self.catalog_dir),
            ("event_dir", &self.event_dir),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::configuration(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }
}
