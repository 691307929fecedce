//! Reference management for Chronicle.
//!
//! Branches are the only mutable state in a repository: named pointers to
//! the latest commit. Everything else is immutable content in the object
//! store.
//!
//! # Architecture
//!
//! - **Branches** live at `refs/heads/<name>`. Creating one may be forced;
//!   moving one is a compare-and-swap from the expected previous commit.
//! - **Ref logs** record every creation and move with the committer and a
//!   message, oldest first.
//! - **HEAD** names the checked-out branch of a non-bare repository, or is
//!   detached at a commit.
//!
//! # Modules
//!
//! - [`error`] - Error types for ref operations
//! - [`types`] - [`Head`] and [`RefLogEntry`]
//! - [`traits`] - The [`RefStore`] trait defining the storage interface
//! - [`names`] - Branch name validation
//! - [`memory`] - In-memory [`InMemoryRefStore`] for tests
//! - [`fs`] - On-disk [`FsRefStore`]

pub mod error;
pub mod fs;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use memory::InMemoryRefStore;
pub use names::{branch_ref_name, validate_branch_name};
pub use traits::RefStore;
pub use types::{Head, RefLogEntry};
