//! Snapshot comparison for Chronicle.
//!
//! Compares two stored trees file by file, recursing only into subtrees whose
//! ids differ. [`differs`] is the gate the synchronizer uses to suppress
//! commits that would not change anything; [`diff_trees`] produces the full
//! list of changes for reporting.
//!
//! # Key Types
//!
//! - [`TreeDiff`] / [`TreeChange`] -- file-level added/deleted/modified paths

pub mod error;
pub mod tree_diff;

pub use error::{DiffError, DiffResult};
pub use tree_diff::{differs, diff_trees, TreeChange, TreeDiff};
