//! Embedded queue schema migrations.
//!
//! Each migration runs once, inside its own transaction, and is recorded in
//! `schema_version` with a BLAKE3 checksum of its SQL. Re-running is a no-op;
//! a recorded migration whose SQL has since changed is rejected.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::{QueueError, QueueResult};

pub struct Migration {
    pub id: &'static str,
    pub sql: &'static str,
}

/// All embedded migrations, in order.
pub fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_outbox_queue",
        sql: include_str!("../migrations/001_outbox_queue.sql"),
    }]
}

pub fn checksum(sql: &str) -> String {
    blake3::hash(sql.as_bytes()).to_hex().to_string()
}

/// Apply every pending migration.
pub fn apply_migrations(conn: &mut Connection) -> QueueResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY,
            migration_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            checksum TEXT NOT NULL
        )",
        [],
    )?;
    for migration in migrations() {
        apply_migration(conn, &migration)?;
    }
    Ok(())
}

fn apply_migration(conn: &mut Connection, migration: &Migration) -> QueueResult<()> {
    let sum = checksum(migration.sql);
    let recorded: Option<String> = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?1",
            [migration.id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(recorded) = recorded {
        if recorded != sum {
            return Err(QueueError::ChecksumMismatch {
                id: migration.id.to_string(),
                expected: recorded,
                actual: sum,
            });
        }
        return Ok(());
    }

    let tx = conn.transaction()?;
    tx.execute_batch(migration.sql)
        .map_err(|e| QueueError::Migration {
            id: migration.id.to_string(),
            reason: e.to_string(),
        })?;
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
        params![migration.id, chrono::Utc::now().timestamp(), sum],
    )?;
    tx.commit()?;
    info!(migration = migration.id, "queue migration applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        apply_migrations(&mut conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, migrations().len() as i64);
    }

    #[test]
    fn edited_migration_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn.execute(
            "UPDATE schema_version SET checksum = 'stale' WHERE migration_id = '001_outbox_queue'",
            [],
        )
        .unwrap();
        assert!(matches!(
            apply_migrations(&mut conn),
            Err(QueueError::ChecksumMismatch { .. })
        ));
    }
}
