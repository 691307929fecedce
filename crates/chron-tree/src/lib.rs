//! Tree building for Chronicle.
//!
//! Snapshots are stored as nested [`Tree`](chron_store::Tree) objects. This
//! crate turns a batch of path-level changes into a new snapshot without
//! materialising the whole hierarchy in memory.
//!
//! # Key Items
//!
//! - [`PathOp`] -- an upsert or removal addressed by slash-separated path
//! - [`filter_ops`] -- last-op-wins dedup, dropping removals of absent paths
//! - [`apply`] -- build the new top-level tree from a baseline and ops
//! - [`lookup`], [`list_files`] -- read-only traversal
//! - [`tombstones`] -- removals that turn a batch into a full replacement

pub mod builder;
pub mod error;
pub mod op;
pub mod walk;

pub use builder::{apply, filter_ops};
pub use error::{TreeError, TreeResult};
pub use op::{split_path, PathOp};
pub use walk::{list_files, lookup, tombstones};
