//! Error types for the tree crate.

/// Errors that can occur while reading or building trees.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A path was empty, absolute, or contained an empty, `.` or `..` segment.
    #[error("invalid path: {0:?}")]
    InvalidPath(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] chron_store::StoreError),
}

/// Convenience alias for tree results.
pub type TreeResult<T> = Result<T, TreeError>;
