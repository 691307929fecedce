//! Error types for reference operations.

use chron_types::ObjectId;
use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The branch was not found.
    #[error("branch not found: {name}")]
    NotFound { name: String },

    /// A non-forced create found the branch already present.
    #[error("branch already exists: {name}")]
    AlreadyExists { name: String },

    /// The branch did not hold the expected value at update time.
    #[error("branch {name} moved: expected {expected}, found {}", actual.map(|a| a.to_hex()).unwrap_or_else(|| "nothing".into()))]
    Conflict {
        name: String,
        expected: ObjectId,
        actual: Option<ObjectId>,
    },

    /// Another updater holds the ref's lock file.
    #[error("ref is locked: {name}")]
    Locked { name: String },

    /// The branch name is invalid.
    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// A ref, ref log or HEAD file could not be parsed.
    #[error("malformed ref data in {name}: {reason}")]
    Malformed { name: String, reason: String },

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
