//! Content-addressed object storage for Chronicle.
//!
//! This crate implements a hash-keyed object store analogous to git's
//! `.git/objects/` directory. Blobs, trees and commits are stored as
//! immutable objects identified by the BLAKE3 hash of their type-tagged,
//! length-prefixed encoding.
//!
//! # Object Types
//!
//! - [`Blob`] -- raw file content
//! - [`Tree`] -- directory listing mapping names to blobs or subtrees
//! - [`Commit`] -- a tree plus its parent and provenance
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`FsObjectStore`] -- zstd-compressed loose objects sharded by first hash byte
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written (content-addressing guarantees this).
//! 2. Writing an object that already exists is a no-op.
//! 3. Objects become visible atomically: readers never see a partial write.
//! 4. Concurrent reads are always safe; concurrent writers to one store are
//!    excluded by the caller.
//! 5. All I/O and compression errors are propagated, never retried here.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, Commit, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
pub use traits::ObjectStore;
