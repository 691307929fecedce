//! The [`RefStore`] trait defining the reference storage interface.

use chron_types::{ObjectId, Signature};

use crate::error::Result;
use crate::types::{Head, RefLogEntry};

/// Storage backend for branch references.
///
/// Branch arguments are short names (`main`, not `refs/heads/main`).
/// Implementations validate names and append a [`RefLogEntry`] for every
/// successful create or update.
pub trait RefStore: Send + Sync {
    /// Current commit of a branch, or `None` if the branch has no commits yet.
    fn read_branch(&self, branch: &str) -> Result<Option<ObjectId>>;

    /// Point a new branch at `target`.
    ///
    /// Without `force`, fails with `AlreadyExists` if the branch is present.
    /// With `force`, an existing branch is overwritten.
    fn create_branch(
        &self,
        branch: &str,
        target: &ObjectId,
        force: bool,
        committer: &Signature,
        message: &str,
    ) -> Result<()>;

    /// Move a branch from `expected` to `new`.
    ///
    /// Fails with `Conflict` if the branch does not currently hold `expected`.
    fn update_branch(
        &self,
        branch: &str,
        expected: &ObjectId,
        new: &ObjectId,
        committer: &Signature,
        message: &str,
    ) -> Result<()>;

    /// Ref log of a branch, oldest entry first. Empty if the branch never existed.
    fn reflog(&self, branch: &str) -> Result<Vec<RefLogEntry>>;

    /// All branches and their commits, sorted by name.
    fn list_branches(&self) -> Result<Vec<(String, ObjectId)>>;

    /// Read the current HEAD state. `Ok(None)` if HEAD has not been set.
    fn head(&self) -> Result<Option<Head>>;

    /// Make HEAD point at a branch (symbolic ref). The branch need not exist yet.
    fn set_head(&self, branch: &str) -> Result<()>;

    /// The branch HEAD names, if any.
    fn head_branch(&self) -> Result<Option<String>> {
        Ok(self
            .head()?
            .and_then(|head| head.branch().map(str::to_string)))
    }
}
