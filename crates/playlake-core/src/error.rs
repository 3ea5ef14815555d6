//! Error types and result aliases for playlake.
//!
//! Every failure is fatal to a pipeline run. The variants follow the failure
//! classes a run can hit: bad configuration, raw data that does not match its
//! declared schema, storage failures and everything else the execution engine
//! reports. Missing input and join non-matches are not errors.

/// The result type used throughout playlake.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in playlake operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A raw field could not be coerced to its declared type.
    #[error("schema violation: {message}")]
    SchemaViolation {
        /// Description of the offending field or value.
        message: String,
    },

    /// A storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The execution engine reported a failure.
    #[error("engine error: {message}")]
    Engine {
        /// Description of the engine failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new schema violation error.
    #[must_use]
    pub fn schema_violation(message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            message: message.into(),
        }
    }

    /// Creates a new storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new engine error with a source cause.
    #[must_use]
    pub fn engine_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Engine {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true when the error aborted a run because raw data did not
    /// match its declared schema.
    #[must_use]
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation { .. })
    }
}
