use std::path::PathBuf;

use thiserror::Error;

/// Queue store unreachable or a queue transaction failed.
///
/// Nothing consumed by a failed drain iteration is deleted, so the next run
/// retries it.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration {id} failed: {reason}")]
    Migration { id: String, reason: String },

    #[error("migration {id} was modified after it was applied: expected checksum {expected}, found {actual}")]
    ChecksumMismatch {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("malformed queue row {id}: {reason}")]
    MalformedRow { id: i64, reason: String },
}

pub type QueueResult<T> = Result<T, QueueError>;

/// A principal could not be mapped to a display identity.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("unknown principal: {0}")]
    UnknownPrincipal(String),

    #[error("identity directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate repository id: {0}")]
    DuplicateRepository(String),

    #[error("repository {id}: {reason}")]
    InvalidRepository { id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("another drain holds the lock at {path}")]
    LockContention { path: PathBuf },

    #[error("lock file {path}: {source}")]
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unknown repository: {0}")]
    UnknownRepository(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("sync error: {0}")]
    Sync(#[from] chron_sync::SyncError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub type OutboxResult<T> = Result<T, OutboxError>;
