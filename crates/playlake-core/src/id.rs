//! Run identifiers.
//!
//! Every pipeline run gets a [`RunId`] that is attached to its logging span.
//! Run IDs are ULIDs, so they sort by start time.

use std::fmt;

use ulid::Ulid;

/// A unique identifier for one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(Ulid);

impl RunId {
    /// Generates a new unique run ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
