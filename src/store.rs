//! SQLite-backed persistence for scheduled notifications.
//!
//! The database lives at `~/.sipnote/reminders.db` and is reachable only
//! from the background scheduler's context. Timers are rebuilt from it after
//! a restart via the wake sweep, so in-memory state is never authoritative.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use thiserror::Error;

use crate::error::NotifyError;
use crate::types::{NotificationKind, ScheduledNotification};

/// Errors specific to the schedule store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Corrupt record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },
}

impl From<StoreError> for NotifyError {
    fn from(err: StoreError) -> Self {
        NotifyError::StorageUnavailable(err.to_string())
    }
}

/// SQLite connection wrapper for the pending-notification table.
///
/// Intentionally NOT `Clone` or `Sync`; the background scheduler holds it
/// behind a `std::sync::Mutex`.
#[derive(Debug)]
pub struct ScheduleStore {
    conn: Connection,
}

impl ScheduleStore {
    /// Open (or create) the store at `~/.sipnote/reminders.db`.
    pub fn open() -> Result<Self, StoreError> {
        Self::open_at(Self::db_path()?)
    }

    /// Open a store at an explicit path. Useful for testing.
    pub fn open_at(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        // Idempotent schema (IF NOT EXISTS throughout)
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self { conn })
    }

    fn db_path() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::HomeDirNotFound)?;
        Ok(home.join(".sipnote").join("reminders.db"))
    }

    /// Idempotent upsert keyed by id. Re-scheduling the same slot replaces
    /// the stored record rather than duplicating it.
    pub fn put(&self, record: &ScheduledNotification) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&record.payload).unwrap_or_else(|_| "{}".to_string());
        self.conn.execute(
            "INSERT OR REPLACE INTO scheduled_notifications
                 (id, user_id, type, scheduled_for, title, body, payload, sent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.user_id,
                record.kind.as_str(),
                record.scheduled_for.to_rfc3339(),
                record.title,
                record.body,
                payload,
                record.sent as i64,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Snapshot of all persisted records, used only for the wake sweep.
    /// Rows that fail to parse are skipped with a warning rather than
    /// poisoning the whole sweep.
    pub fn get_all(&self) -> Result<Vec<ScheduledNotification>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, type, scheduled_for, title, body, payload, sent, created_at
             FROM scheduled_notifications",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, user_id, kind, scheduled_for, title, body, payload, sent, created_at) = row?;
            match parse_record(
                id.clone(),
                user_id,
                &kind,
                &scheduled_for,
                title,
                body,
                &payload,
                sent,
                &created_at,
            ) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Store: skipping unreadable record: {}", e),
            }
        }
        Ok(records)
    }

    /// Remove a record. No-op when the id is absent.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM scheduled_notifications WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// Number of persisted records (diagnostics).
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM scheduled_notifications",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[allow(clippy::too_many_arguments)]
fn parse_record(
    id: String,
    user_id: String,
    kind: &str,
    scheduled_for: &str,
    title: String,
    body: String,
    payload: &str,
    sent: i64,
    created_at: &str,
) -> Result<ScheduledNotification, StoreError> {
    let kind: NotificationKind = kind.parse().map_err(|reason| StoreError::CorruptRecord {
        id: id.clone(),
        reason,
    })?;
    let scheduled_for = parse_rfc3339(scheduled_for, &id)?;
    let created_at = parse_rfc3339(created_at, &id)?;
    let payload: HashMap<String, String> = serde_json::from_str(payload).unwrap_or_default();

    Ok(ScheduledNotification {
        id,
        user_id,
        kind,
        scheduled_for,
        title,
        body,
        payload,
        sent: sent != 0,
        created_at,
    })
}

fn parse_rfc3339(s: &str, id: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRecord {
            id: id.to_string(),
            reason: format!("bad timestamp '{}': {}", s, e),
        })
}
