use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use tracing::debug;

use crate::error::QueueResult;
use crate::migrations::apply_migrations;
use crate::queue::{NewRequest, QueueGroup, QueueSource, QueuedFile, QueuedRequest};

/// Queue backed by a SQLite database.
pub struct SqliteQueue {
    conn: Connection,
}

impl SqliteQueue {
    /// Open (creating if needed) the queue database at `path`.
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        // journal_mode returns a row, so plain execute would fail.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "queue database opened");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> QueueResult<Self> {
        apply_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Insert a request and its files atomically. Returns the request id.
    pub fn enqueue(&mut self, request: &NewRequest) -> QueueResult<i64> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO outbox_requests
                (repo, group_id, principal, description, queued_at, utc_offset_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                request.repo,
                request.group_id,
                request.principal,
                request.description,
                request.queued_at.timestamp(),
                request.queued_at.offset().local_minus_utc() / 60,
            ],
        )?;
        let id = tx.last_insert_rowid();
        {
            let mut insert = tx.prepare(
                "INSERT INTO outbox_files (request_id, filename, content) VALUES (?1, ?2, ?3)",
            )?;
            for (filename, content) in &request.files {
                insert.execute(params![id, filename, content])?;
            }
        }
        tx.commit()?;
        debug!(
            id,
            repo = %request.repo,
            group = %request.group_id,
            files = request.files.len(),
            "request enqueued"
        );
        Ok(id)
    }

    /// Number of pending requests for `repo`.
    pub fn pending(&self, repo: &str) -> QueueResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM outbox_requests WHERE repo = ?1",
            [repo],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn load_requests(tx: &Transaction<'_>, repo: &str, group_id: &str) -> QueueResult<Vec<QueuedRequest>> {
    let mut stmt = tx.prepare(
        "SELECT id, repo, group_id, principal, description, queued_at, utc_offset_minutes
         FROM outbox_requests
         WHERE repo = ?1 AND group_id = ?2
         ORDER BY id",
    )?;
    let rows = stmt.query_map(params![repo, group_id], |row| {
        Ok(QueuedRequest {
            id: row.get(0)?,
            repo: row.get(1)?,
            group_id: row.get(2)?,
            principal: row.get(3)?,
            description: row.get(4)?,
            queued_at: row.get(5)?,
            utc_offset_minutes: row.get(6)?,
            files: Vec::new(),
        })
    })?;
    let mut requests = rows.collect::<Result<Vec<_>, _>>()?;

    let mut files = tx.prepare(
        "SELECT file_id, filename, content FROM outbox_files
         WHERE request_id = ?1
         ORDER BY file_id",
    )?;
    for request in &mut requests {
        let rows = files.query_map([request.id], |row| {
            Ok(QueuedFile {
                file_id: row.get(0)?,
                filename: row.get(1)?,
                content: row.get(2)?,
            })
        })?;
        request.files = rows.collect::<Result<Vec<_>, _>>()?;
    }
    Ok(requests)
}

impl QueueSource for SqliteQueue {
    fn next_group(&mut self, repo: &str) -> QueueResult<Option<QueueGroup>> {
        let tx = self.conn.transaction()?;
        let group_id: Option<String> = tx
            .query_row(
                "SELECT group_id FROM outbox_requests WHERE repo = ?1 ORDER BY id LIMIT 1",
                [repo],
                |row| row.get(0),
            )
            .optional()?;
        let Some(group_id) = group_id else {
            tx.commit()?;
            return Ok(None);
        };
        let requests = load_requests(&tx, repo, &group_id)?;
        tx.commit()?;
        Ok(Some(QueueGroup {
            repo: repo.to_string(),
            group_id,
            requests,
        }))
    }

    fn acknowledge(&mut self, request_ids: &[i64]) -> QueueResult<()> {
        if request_ids.is_empty() {
            return Ok(());
        }
        let placeholders = vec!["?"; request_ids.len()].join(", ");
        let tx = self.conn.transaction()?;
        let files = tx.execute(
            &format!("DELETE FROM outbox_files WHERE request_id IN ({placeholders})"),
            params_from_iter(request_ids),
        )?;
        let requests = tx.execute(
            &format!("DELETE FROM outbox_requests WHERE id IN ({placeholders})"),
            params_from_iter(request_ids),
        )?;
        tx.commit()?;
        debug!(requests, files, "requests acknowledged");
        Ok(())
    }
}
