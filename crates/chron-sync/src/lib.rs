//! Repository synchronization for Chronicle.
//!
//! Turns a [`ChangeSet`] into at most one commit on a branch. Blobs are
//! written to the object store, the path ops are applied to the branch's
//! current snapshot, and the commit is only created (and the branch only
//! moved) when the resulting snapshot differs.
//!
//! [`Repository`] also owns the on-disk layout, the staging snapshot and the
//! forced checkout of the head commit into a working tree.

pub mod change;
pub mod checkout;
pub mod error;
pub mod repository;
pub mod synchronizer;

pub use change::{ChangeSet, FileUpdate, SyncOutcome};
pub use checkout::CheckoutStats;
pub use error::{RepositoryStateError, SyncError, SyncResult};
pub use repository::{Repository, METADATA_DIR};
pub use synchronizer::{history, synchronize};

// Re-export key types
pub use chron_store::Commit;
pub use chron_types::{Identity, ObjectId, Signature};
