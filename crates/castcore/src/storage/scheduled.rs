//! Scheduled messages waiting for the sweep.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::core::config::limits;
use crate::core::error::{AppError, AppResult, Validator};
use crate::core::types::{BroadcastStatus, ScheduledStatus};
use crate::storage::broadcasts::{create_broadcast, get_broadcast, Broadcast, NewBroadcast};
use crate::storage::db::now;
use crate::storage::recipients::count_active_recipients;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMessage {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: ScheduledStatus,
    /// Active recipients at creation time; informational only.
    pub recipient_count: i64,
    pub broadcast_id: Option<i64>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewScheduledMessage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl NewScheduledMessage {
    pub fn validate(&self, at: DateTime<Utc>) -> AppResult<()> {
        let mut v = Validator::new();
        v.text("title", &self.title, limits::MAX_TITLE_CHARS);
        v.text("message", &self.message, limits::MAX_MESSAGE_CHARS);
        check_future(&mut v, self.scheduled_for, at, true);
        v.finish("Invalid scheduled message data")
    }
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl ScheduledUpdate {
    pub fn validate(&self, at: DateTime<Utc>) -> AppResult<()> {
        let mut v = Validator::new();
        if let Some(title) = &self.title {
            v.text("title", title, limits::MAX_TITLE_CHARS);
        }
        if let Some(message) = &self.message {
            v.text("message", message, limits::MAX_MESSAGE_CHARS);
        }
        check_future(&mut v, self.scheduled_for, at, false);
        v.finish("Invalid scheduled message data")
    }
}

fn check_future(v: &mut Validator, when: Option<DateTime<Utc>>, at: DateTime<Utc>, required: bool) {
    match when {
        Some(when) if when <= at => v.reject("scheduledFor", "scheduledFor must be in the future"),
        None if required => v.reject("scheduledFor", "scheduledFor is required"),
        _ => {}
    }
}

const COLUMNS: &str = "id, title, message, scheduled_for, status, recipient_count, broadcast_id, \
     sent_at, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<ScheduledMessage> {
    Ok(ScheduledMessage {
        id: row.get(0)?,
        title: row.get(1)?,
        message: row.get(2)?,
        scheduled_for: row.get(3)?,
        status: row.get(4)?,
        recipient_count: row.get(5)?,
        broadcast_id: row.get(6)?,
        sent_at: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Validates and stores a pending message, snapshotting the active
/// recipient count.
pub fn create_scheduled(conn: &Connection, new: &NewScheduledMessage) -> AppResult<ScheduledMessage> {
    let created_at = now();
    new.validate(created_at)?;
    // Present after validation.
    let scheduled_for = new.scheduled_for.unwrap_or(created_at);

    let recipient_count = count_active_recipients(conn)?;
    conn.execute(
        "INSERT INTO scheduled_messages \
         (title, message, scheduled_for, status, recipient_count, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            new.title,
            new.message,
            scheduled_for,
            ScheduledStatus::Pending,
            recipient_count,
            created_at
        ],
    )?;

    Ok(ScheduledMessage {
        id: conn.last_insert_rowid(),
        title: new.title.clone(),
        message: new.message.clone(),
        scheduled_for,
        status: ScheduledStatus::Pending,
        recipient_count,
        broadcast_id: None,
        sent_at: None,
        created_at,
        updated_at: created_at,
    })
}

pub fn get_scheduled(conn: &Connection, id: i64) -> AppResult<Option<ScheduledMessage>> {
    let sql = format!("SELECT {} FROM scheduled_messages WHERE id = ?1", COLUMNS);
    Ok(conn.query_row(&sql, [id], from_row).optional()?)
}

/// Every scheduled message, soonest first.
pub fn list_scheduled(conn: &Connection) -> AppResult<Vec<ScheduledMessage>> {
    let sql = format!("SELECT {} FROM scheduled_messages ORDER BY scheduled_for, id", COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn require_pending(conn: &Connection, id: i64) -> AppResult<ScheduledMessage> {
    let existing = get_scheduled(conn, id)?.ok_or(AppError::NotFound("Scheduled message"))?;
    if existing.status != ScheduledStatus::Pending {
        return Err(AppError::Conflict(format!(
            "Scheduled message is already {}",
            existing.status
        )));
    }
    Ok(existing)
}

/// Applies a partial update to a pending message.
///
/// A missing or no longer pending message is reported before the payload
/// is validated.
pub fn update_scheduled(conn: &Connection, id: i64, update: &ScheduledUpdate) -> AppResult<ScheduledMessage> {
    let existing = require_pending(conn, id)?;
    update.validate(now())?;

    let updated = ScheduledMessage {
        title: update.title.clone().unwrap_or(existing.title),
        message: update.message.clone().unwrap_or(existing.message),
        scheduled_for: update.scheduled_for.unwrap_or(existing.scheduled_for),
        updated_at: now(),
        ..existing
    };
    conn.execute(
        "UPDATE scheduled_messages SET title = ?1, message = ?2, scheduled_for = ?3, updated_at = ?4 \
         WHERE id = ?5 AND status = ?6",
        params![
            updated.title,
            updated.message,
            updated.scheduled_for,
            updated.updated_at,
            id,
            ScheduledStatus::Pending
        ],
    )?;
    Ok(updated)
}

/// `pending → cancelled`.
pub fn cancel_scheduled(conn: &Connection, id: i64) -> AppResult<ScheduledMessage> {
    let existing = require_pending(conn, id)?;
    let updated_at = now();
    conn.execute(
        "UPDATE scheduled_messages SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![ScheduledStatus::Cancelled, updated_at, id, ScheduledStatus::Pending],
    )?;
    Ok(ScheduledMessage {
        status: ScheduledStatus::Cancelled,
        updated_at,
        ..existing
    })
}

pub fn delete_scheduled(conn: &Connection, id: i64) -> AppResult<bool> {
    let changed = conn.execute("DELETE FROM scheduled_messages WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

/// Pending messages due at `at`, oldest due first.
pub fn due_scheduled(conn: &Connection, at: DateTime<Utc>) -> AppResult<Vec<ScheduledMessage>> {
    let sql = format!(
        "SELECT {} FROM scheduled_messages WHERE status = ?1 AND scheduled_for <= ?2 \
         ORDER BY scheduled_for, id",
        COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![ScheduledStatus::Pending, at], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Turns a pending message into a claimed (`sending`) broadcast.
///
/// Runs in one transaction: the broadcast is created and claimed, and the
/// message moves `pending → sent` with the new broadcast id. Returns `None`
/// if the message is no longer pending, in which case nothing is written.
pub fn promote_scheduled(conn: &mut Connection, id: i64) -> AppResult<Option<Broadcast>> {
    let tx = conn.transaction()?;
    let Some(existing) = get_scheduled(&tx, id)? else {
        return Ok(None);
    };

    // Created as a plain draft: the due time has already passed.
    let broadcast = create_broadcast(&tx, &NewBroadcast::new(existing.title, existing.message))?;
    tx.execute(
        "UPDATE broadcasts SET status = ?1 WHERE id = ?2",
        params![BroadcastStatus::Sending, broadcast.id],
    )?;

    let ts = now();
    let changed = tx.execute(
        "UPDATE scheduled_messages SET status = ?1, broadcast_id = ?2, sent_at = ?3, updated_at = ?3 \
         WHERE id = ?4 AND status = ?5",
        params![ScheduledStatus::Sent, broadcast.id, ts, id, ScheduledStatus::Pending],
    )?;
    if changed == 0 {
        // Dropping the transaction rolls the broadcast back.
        return Ok(None);
    }

    let claimed = get_broadcast(&tx, broadcast.id)?;
    tx.commit()?;
    Ok(claimed)
}
