use std::path::PathBuf;

use chron_types::ObjectId;
use thiserror::Error;

/// The repository's stored state is missing or inconsistent.
#[derive(Debug, Error)]
pub enum RepositoryStateError {
    #[error("branch {branch} moved during synchronization: expected {expected}, found {}", actual.map(|a| a.to_hex()).unwrap_or_else(|| "nothing".into()))]
    RefMoved {
        branch: String,
        expected: ObjectId,
        actual: Option<ObjectId>,
    },

    #[error("{what} {id} referenced by {referrer} is missing")]
    MissingObject {
        what: &'static str,
        id: ObjectId,
        referrer: String,
    },

    #[error("malformed staging index: {0}")]
    MalformedIndex(String),

    #[error("repository has no working tree")]
    NoWorkdir,

    #[error("working tree file {0} has local modifications")]
    DirtyWorktree(String),

    #[error("refusing to check out {0} over repository metadata")]
    UnsafePath(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not a repository: {0}")]
    NotARepository(PathBuf),

    #[error("repository state error: {0}")]
    State(#[from] RepositoryStateError),

    #[error("store error: {0}")]
    Store(#[from] chron_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] chron_refs::RefError),

    #[error("tree error: {0}")]
    Tree(#[from] chron_tree::TreeError),

    #[error("diff error: {0}")]
    Diff(#[from] chron_diff::DiffError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;
