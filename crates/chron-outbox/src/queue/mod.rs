//! The durable queue the processor drains.
//!
//! Producers insert one request per logical change, each carrying zero or
//! more files. Requests that share a group id form one change set. The
//! processor reads the oldest group for a repository, applies it, and only
//! then acknowledges (deletes) the rows it consumed.

pub mod memory;
pub mod sqlite;

use chron_types::Signature;
use chrono::{DateTime, FixedOffset};

use crate::error::{QueueError, QueueResult};

pub use memory::InMemoryQueue;
pub use sqlite::SqliteQueue;

/// A file row. `filename == None` is the clear-all marker; `content == None`
/// deletes the file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedFile {
    pub file_id: i64,
    pub filename: Option<String>,
    pub content: Option<Vec<u8>>,
}

/// A request row with its files, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuedRequest {
    pub id: i64,
    pub repo: String,
    pub group_id: String,
    pub principal: String,
    pub description: String,
    /// Seconds since the Unix epoch.
    pub queued_at: i64,
    pub utc_offset_minutes: i32,
    pub files: Vec<QueuedFile>,
}

impl QueuedRequest {
    /// When the request was queued, in the producer's own UTC offset.
    pub fn queued_time(&self) -> QueueResult<DateTime<FixedOffset>> {
        Signature::timestamp_from_parts(self.queued_at, self.utc_offset_minutes).map_err(|e| {
            QueueError::MalformedRow {
                id: self.id,
                reason: e.to_string(),
            }
        })
    }
}

/// Every request sharing the oldest pending group id, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueGroup {
    pub repo: String,
    pub group_id: String,
    pub requests: Vec<QueuedRequest>,
}

impl QueueGroup {
    pub fn request_ids(&self) -> Vec<i64> {
        self.requests.iter().map(|r| r.id).collect()
    }

    pub fn file_count(&self) -> usize {
        self.requests.iter().map(|r| r.files.len()).sum()
    }
}

/// A request as submitted by a producer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRequest {
    pub repo: String,
    pub group_id: String,
    pub principal: String,
    pub description: String,
    pub queued_at: DateTime<FixedOffset>,
    /// `(filename, content)` pairs, with the same null conventions as [`QueuedFile`].
    pub files: Vec<(Option<String>, Option<Vec<u8>>)>,
}

impl NewRequest {
    pub fn new(
        repo: impl Into<String>,
        group_id: impl Into<String>,
        principal: impl Into<String>,
        description: impl Into<String>,
        queued_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            repo: repo.into(),
            group_id: group_id.into(),
            principal: principal.into(),
            description: description.into(),
            queued_at,
            files: Vec::new(),
        }
    }

    pub fn upsert(mut self, filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.push((Some(filename.into()), Some(content.into())));
        self
    }

    pub fn delete(mut self, filename: impl Into<String>) -> Self {
        self.files.push((Some(filename.into()), None));
        self
    }

    pub fn clear_all(mut self) -> Self {
        self.files.push((None, None));
        self
    }
}

/// Source of pending change requests.
pub trait QueueSource {
    /// The oldest pending group for `repo`, or `None` if nothing is queued.
    ///
    /// Reads happen in one transaction that is closed before this returns.
    fn next_group(&mut self, repo: &str) -> QueueResult<Option<QueueGroup>>;

    /// Delete the given requests and their files in one transaction.
    fn acknowledge(&mut self, request_ids: &[i64]) -> QueueResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_time_keeps_offset() {
        let request = QueuedRequest {
            id: 1,
            repo: "r".into(),
            group_id: "g".into(),
            principal: "p".into(),
            description: String::new(),
            queued_at: 1_700_000_000,
            utc_offset_minutes: -300,
            files: vec![],
        };
        let when = request.queued_time().unwrap();
        assert_eq!(when.timestamp(), 1_700_000_000);
        assert_eq!(when.offset().local_minus_utc(), -300 * 60);

        for minutes in [100_000, 40_000_000, i32::MIN] {
            let bad = QueuedRequest {
                utc_offset_minutes: minutes,
                ..request.clone()
            };
            assert!(matches!(
                bad.queued_time(),
                Err(QueueError::MalformedRow { id: 1, .. })
            ));
        }
    }

    #[test]
    fn new_request_builder() {
        let when = Signature::timestamp_from_parts(0, 0).unwrap();
        let request = NewRequest::new("r", "g", "p", "d", when)
            .upsert("a.sql", "x")
            .delete("b.sql")
            .clear_all();
        assert_eq!(
            request.files,
            vec![
                (Some("a.sql".to_string()), Some(b"x".to_vec())),
                (Some("b.sql".to_string()), None),
                (None, None),
            ]
        );
    }
}
