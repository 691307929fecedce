//! Path operations applied to a snapshot.

use chron_types::ObjectId;

use crate::error::{TreeError, TreeResult};

/// A single change to a snapshot, addressed by slash-separated path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathOp {
    /// Point `path` at a blob, creating parent directories as needed.
    Upsert { path: String, blob_id: ObjectId },
    /// Delete `path` (a file or a whole directory).
    Remove { path: String },
}

impl PathOp {
    pub fn upsert(path: impl Into<String>, blob_id: ObjectId) -> Self {
        Self::Upsert {
            path: path.into(),
            blob_id,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self::Remove { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Upsert { path, .. } | Self::Remove { path } => path,
        }
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }
}

/// Split a relative path into its segments.
///
/// ```
/// use chron_tree::split_path;
///
/// assert_eq!(split_path("schema/tables/users.sql").unwrap(), ["schema", "tables", "users.sql"]);
/// assert!(split_path("/abs").is_err());
/// assert!(split_path("a//b").is_err());
/// assert!(split_path("a/../b").is_err());
/// ```
pub fn split_path(path: &str) -> TreeResult<Vec<&str>> {
    if path.is_empty() {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    let segments: Vec<&str> = path.split('/').collect();
    let bad = segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\0'));
    if bad {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}
