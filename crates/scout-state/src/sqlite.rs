//! `SQLite`-backed implementation of [`CheckpointStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety. Calls are short
//! local statements and run inline on the caller's task.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use scout_types::state::{Checkpoint, RunLog, RunStatus, StreamId};

use crate::backend::CheckpointStore;
use crate::error::{self, StateError};

/// Idempotent DDL for state tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS sync_checkpoints (
    id TEXT PRIMARY KEY,
    last_sync_at TEXT,
    records_synced INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error_message TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS sync_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    checkpoint_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    records_processed INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error_count INTEGER NOT NULL DEFAULT 0,
    error_details TEXT
);

CREATE INDEX IF NOT EXISTS idx_sync_logs_checkpoint ON sync_logs (checkpoint_id, id);
";

/// `SQLite`-backed state storage.
///
/// Create with [`SqliteCheckpointStore::open`] for file-backed persistence
/// or [`SqliteCheckpointStore::in_memory`] for tests.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// All run logs for a stream, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on query failure or an undecodable row.
    pub fn run_logs(&self, stream: &StreamId) -> error::Result<Vec<RunLog>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT started_at, completed_at, records_processed, status, error_count, \
             error_details FROM sync_logs WHERE checkpoint_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([stream.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut logs = Vec::new();
        for row in rows {
            let (started, completed, processed, status, error_count, error_details) = row?;
            logs.push(RunLog {
                stream: stream.clone(),
                started_at: parse_timestamp(&started)?,
                completed_at: parse_timestamp(&completed)?,
                records_processed: to_u64(processed),
                status: parse_status(&status)?,
                error_count: to_u64(error_count),
                error_details,
            });
        }
        Ok(logs)
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> error::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StateError::Corrupt(format!("timestamp '{raw}': {e}")))
}

fn parse_status(raw: &str) -> error::Result<RunStatus> {
    raw.parse::<RunStatus>()
        .map_err(|e| StateError::Corrupt(e.to_string()))
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

impl CheckpointStore for SqliteCheckpointStore {
    async fn get_checkpoint(&self, stream: &StreamId) -> error::Result<Option<Checkpoint>> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT last_sync_at, records_synced, status, error_message \
             FROM sync_checkpoints WHERE id = ?1",
            [stream.as_str()],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        );

        match result {
            Ok((last_sync_at, records_synced, status, error_message)) => Ok(Some(Checkpoint {
                stream: stream.clone(),
                watermark: last_sync_at.as_deref().map(parse_timestamp).transpose()?,
                records_synced: to_u64(records_synced),
                status: parse_status(&status)?,
                error_message,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_checkpoint(&self, checkpoint: &Checkpoint) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO sync_checkpoints \
             (id, last_sync_at, records_synced, status, error_message, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, datetime('now')) \
             ON CONFLICT(id) DO UPDATE SET last_sync_at = ?2, records_synced = ?3, \
             status = ?4, error_message = ?5, updated_at = datetime('now')",
            rusqlite::params![
                checkpoint.stream.as_str(),
                checkpoint.watermark.as_ref().map(format_timestamp),
                to_i64(checkpoint.records_synced),
                checkpoint.status.as_str(),
                checkpoint.error_message,
            ],
        )?;
        Ok(())
    }

    async fn append_run_log(&self, log: &RunLog) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO sync_logs \
             (checkpoint_id, started_at, completed_at, records_processed, status, \
             error_count, error_details) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                log.stream.as_str(),
                format_timestamp(&log.started_at),
                format_timestamp(&log.completed_at),
                to_i64(log.records_processed),
                log.status.as_str(),
                to_i64(log.error_count),
                log.error_details,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stream(name: &str) -> StreamId {
        StreamId::new(name)
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, hour, 0, 0).unwrap()
    }

    fn checkpoint(name: &str, watermark: Option<DateTime<Utc>>, records: u64) -> Checkpoint {
        Checkpoint {
            stream: stream(name),
            watermark,
            records_synced: records,
            status: RunStatus::Success,
            error_message: None,
        }
    }

    fn run_log(name: &str, status: RunStatus, errors: &[&str]) -> RunLog {
        RunLog {
            stream: stream(name),
            started_at: at(10),
            completed_at: at(11),
            records_processed: 7,
            status,
            error_count: errors.len() as u64,
            error_details: if errors.is_empty() {
                None
            } else {
                Some(errors.join("\n"))
            },
        }
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        assert!(store.get_checkpoint(&stream("s")).await.unwrap().is_none());

        store
            .set_checkpoint(&checkpoint("s", Some(at(10)), 12))
            .await
            .unwrap();

        let got = store.get_checkpoint(&stream("s")).await.unwrap().unwrap();
        assert_eq!(got.watermark, Some(at(10)));
        assert_eq!(got.records_synced, 12);
        assert_eq!(got.status, RunStatus::Success);
        assert!(got.error_message.is_none());
    }

    #[tokio::test]
    async fn checkpoint_upsert_overwrites() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        store
            .set_checkpoint(&checkpoint("s", Some(at(10)), 1))
            .await
            .unwrap();
        store
            .set_checkpoint(&checkpoint("s", Some(at(12)), 2))
            .await
            .unwrap();

        let got = store.get_checkpoint(&stream("s")).await.unwrap().unwrap();
        assert_eq!(got.watermark, Some(at(12)));
        assert_eq!(got.records_synced, 2);
    }

    #[tokio::test]
    async fn checkpoint_without_watermark() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        store
            .set_checkpoint(&checkpoint("s", None, 0))
            .await
            .unwrap();
        let got = store.get_checkpoint(&stream("s")).await.unwrap().unwrap();
        assert!(got.watermark.is_none());
    }

    #[tokio::test]
    async fn different_streams_independent() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        store
            .set_checkpoint(&checkpoint("a", Some(at(1)), 1))
            .await
            .unwrap();
        store
            .set_checkpoint(&checkpoint("b", Some(at(2)), 2))
            .await
            .unwrap();

        let a = store.get_checkpoint(&stream("a")).await.unwrap().unwrap();
        let b = store.get_checkpoint(&stream("b")).await.unwrap().unwrap();
        assert_eq!(a.watermark, Some(at(1)));
        assert_eq!(b.watermark, Some(at(2)));
    }

    #[tokio::test]
    async fn run_logs_are_appended_in_order() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        store
            .append_run_log(&run_log("s", RunStatus::Success, &[]))
            .await
            .unwrap();
        store
            .append_run_log(&run_log("s", RunStatus::Failed, &["boom", "bang"]))
            .await
            .unwrap();
        store
            .append_run_log(&run_log("other", RunStatus::DryRun, &[]))
            .await
            .unwrap();

        let logs = store.run_logs(&stream("s")).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, RunStatus::Success);
        assert_eq!(logs[1].status, RunStatus::Failed);
        assert_eq!(logs[1].error_count, 2);
        assert_eq!(logs[1].error_details.as_deref(), Some("boom\nbang"));
        assert_eq!(logs[0].started_at, at(10));
    }

    #[tokio::test]
    async fn corrupt_status_is_reported() {
        let store = SqliteCheckpointStore::in_memory().unwrap();
        {
            let conn = store.lock_conn().unwrap();
            conn.execute(
                "INSERT INTO sync_checkpoints (id, status) VALUES ('s', 'weird')",
                [],
            )
            .unwrap();
        }
        let err = store.get_checkpoint(&stream("s")).await.unwrap_err();
        assert!(matches!(err, StateError::Corrupt(_)), "got: {err}");
    }

    #[tokio::test]
    async fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        {
            let store = SqliteCheckpointStore::open(&path).unwrap();
            store
                .set_checkpoint(&checkpoint("s", Some(at(9)), 3))
                .await
                .unwrap();
        }
        let store = SqliteCheckpointStore::open(&path).unwrap();
        let got = store.get_checkpoint(&stream("s")).await.unwrap().unwrap();
        assert_eq!(got.watermark, Some(at(9)));
    }

    #[test]
    fn timestamp_format_roundtrips() {
        let ts = at(10);
        let raw = format_timestamp(&ts);
        assert_eq!(raw, "2026-01-15T10:00:00.000000Z");
        assert_eq!(parse_timestamp(&raw).unwrap(), ts);
    }
}
