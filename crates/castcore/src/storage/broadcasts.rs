//! Broadcasts and their lifecycle transitions.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::core::config::limits;
use crate::core::error::{AppError, AppResult, Validator};
use crate::core::types::BroadcastStatus;
use crate::storage::db::{json_column, now};

/// An operator-authored message for fan-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub status: BroadcastStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub total_recipients: i64,
    pub successful_deliveries: i64,
    pub failed_deliveries: i64,
    pub metadata: Option<serde_json::Value>,
}

/// Create payload.
///
/// Title and message default to empty so a missing field is reported as a
/// validation problem rather than a decoding failure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBroadcast {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<BroadcastStatus>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl NewBroadcast {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Checks bounds and the initial status relative to `at`.
    pub fn validate(&self, at: DateTime<Utc>) -> AppResult<()> {
        let mut v = Validator::new();
        v.text("title", &self.title, limits::MAX_TITLE_CHARS);
        v.text("message", &self.message, limits::MAX_MESSAGE_CHARS);

        match self.status.unwrap_or_default() {
            BroadcastStatus::Draft => {}
            BroadcastStatus::Scheduled => match self.scheduled_for {
                Some(when) if when > at => {}
                Some(_) => v.reject("scheduledFor", "scheduledFor must be in the future"),
                None => v.reject("scheduledFor", "scheduledFor is required for a scheduled broadcast"),
            },
            other => v.reject("status", format!("status must be draft or scheduled, not {}", other)),
        }

        v.finish("Invalid broadcast data")
    }
}

const COLUMNS: &str = "id, title, message, status, scheduled_for, sent_at, created_at, \
     total_recipients, successful_deliveries, failed_deliveries, metadata";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Broadcast> {
    Ok(Broadcast {
        id: row.get(0)?,
        title: row.get(1)?,
        message: row.get(2)?,
        status: row.get(3)?,
        scheduled_for: row.get(4)?,
        sent_at: row.get(5)?,
        created_at: row.get(6)?,
        total_recipients: row.get(7)?,
        successful_deliveries: row.get(8)?,
        failed_deliveries: row.get(9)?,
        metadata: json_column(row.get(10)?),
    })
}

/// Validates and inserts a broadcast with zeroed counts.
pub fn create_broadcast(conn: &Connection, new: &NewBroadcast) -> AppResult<Broadcast> {
    let created_at = now();
    new.validate(created_at)?;

    let status = new.status.unwrap_or_default();
    let metadata = new.metadata.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO broadcasts (title, message, status, scheduled_for, created_at, metadata) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![new.title, new.message, status, new.scheduled_for, created_at, metadata],
    )?;

    Ok(Broadcast {
        id: conn.last_insert_rowid(),
        title: new.title.clone(),
        message: new.message.clone(),
        status,
        scheduled_for: new.scheduled_for,
        sent_at: None,
        created_at,
        total_recipients: 0,
        successful_deliveries: 0,
        failed_deliveries: 0,
        metadata: new.metadata.clone(),
    })
}

pub fn get_broadcast(conn: &Connection, id: i64) -> AppResult<Option<Broadcast>> {
    let sql = format!("SELECT {} FROM broadcasts WHERE id = ?1", COLUMNS);
    Ok(conn.query_row(&sql, [id], from_row).optional()?)
}

/// Broadcasts, newest first, optionally capped.
pub fn list_broadcasts(conn: &Connection, limit: Option<u32>) -> AppResult<Vec<Broadcast>> {
    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map(i64::from).unwrap_or(-1);
    let sql = format!(
        "SELECT {} FROM broadcasts ORDER BY created_at DESC, id DESC LIMIT ?1",
        COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([limit], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Deletes a broadcast and its delivery records.
///
/// Returns false for an unknown id. A broadcast that is currently sending
/// cannot be deleted.
pub fn delete_broadcast(conn: &Connection, id: i64) -> AppResult<bool> {
    let Some(existing) = get_broadcast(conn, id)? else {
        return Ok(false);
    };
    if existing.status == BroadcastStatus::Sending {
        return Err(AppError::Conflict(
            "Cannot delete a broadcast while it is being sent".to_string(),
        ));
    }
    let changed = conn.execute("DELETE FROM broadcasts WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

/// Atomically moves a `draft` broadcast to `sending`.
///
/// Returns false when the broadcast is missing or not a draft, so two
/// concurrent send requests cannot both start a dispatch.
pub fn claim_broadcast(conn: &Connection, id: i64) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE broadcasts SET status = ?1 WHERE id = ?2 AND status = ?3",
        params![BroadcastStatus::Sending, id, BroadcastStatus::Draft],
    )?;
    Ok(changed == 1)
}

/// Unconditional status write. `sent` also stamps `sent_at`.
pub fn set_broadcast_status(conn: &Connection, id: i64, status: BroadcastStatus) -> AppResult<()> {
    if status == BroadcastStatus::Sent {
        conn.execute(
            "UPDATE broadcasts SET status = ?1, sent_at = ?2 WHERE id = ?3",
            params![status, now(), id],
        )?;
    } else {
        conn.execute("UPDATE broadcasts SET status = ?1 WHERE id = ?2", params![status, id])?;
    }
    Ok(())
}

/// Writes the aggregate counts of a dispatch run in one statement.
pub fn record_counts(conn: &Connection, id: i64, successful: i64, failed: i64) -> AppResult<()> {
    conn.execute(
        "UPDATE broadcasts SET total_recipients = ?1, successful_deliveries = ?2, failed_deliveries = ?3 \
         WHERE id = ?4",
        params![successful + failed, successful, failed, id],
    )?;
    Ok(())
}

pub fn count_broadcasts_with_status(conn: &Connection, status: BroadcastStatus) -> AppResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM broadcasts WHERE status = ?1",
        [status],
        |row| row.get(0),
    )?)
}
