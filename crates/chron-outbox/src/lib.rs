//! Outbox processing for Chronicle.
//!
//! Producers queue change requests (files to upsert or delete, grouped by a
//! group id) in a durable queue. A drain run takes a process-wide lock, then
//! for each registered repository folds the oldest pending group into a
//! [`chron_sync::ChangeSet`], synchronizes it, and only afterwards deletes the
//! consumed rows. A crash between commit and delete re-delivers the group,
//! which then synchronizes as a no-op.
//!
//! # Key Types
//!
//! - [`OutboxProcessor`] - The drain loop over a [`QueueSource`]
//! - [`SqliteQueue`] - Durable queue in a SQLite database
//! - [`OutboxConfig`] / [`RepositoryRegistry`] - `chron.toml` and the repositories it names
//! - [`ProcessLock`] - Exclusive lock held for one drain run

pub mod config;
pub mod error;
pub mod identity;
pub mod lock;
pub mod migrations;
pub mod processor;
pub mod queue;

pub use config::{OutboxConfig, RepositoryConfig, RepositoryRegistry};
pub use error::{ConfigError, IdentityError, OutboxError, OutboxResult, QueueError, QueueResult};
pub use identity::{fallback_identity, resolve_or_fallback, IdentityResolver, StaticDirectory};
pub use lock::ProcessLock;
pub use processor::{fold_group, run, DrainReport, DrainStats, OutboxProcessor, RepositoryReport};
pub use queue::{
    InMemoryQueue, NewRequest, QueueGroup, QueueSource, QueuedFile, QueuedRequest, SqliteQueue,
};
