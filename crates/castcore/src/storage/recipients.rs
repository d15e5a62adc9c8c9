//! Recipients: Telegram users registered through the bot.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::core::error::AppResult;
use crate::storage::db::now;

/// A registered bot user.
///
/// `telegram_id` is the opaque handle messages are sent to. It is unique and
/// never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: i64,
    pub telegram_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Recipient {
    /// Best available human-readable name, for logs.
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.username.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("Unknown")
    }
}

/// Profile fields captured from the first "start" event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRecipient {
    pub telegram_id: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Numbers shown on the users page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientStats {
    pub total: i64,
    pub active_today: i64,
    pub new_this_month: i64,
}

const COLUMNS: &str =
    "id, telegram_id, username, first_name, last_name, phone_number, is_active, joined_at, last_active_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Recipient> {
    Ok(Recipient {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        phone_number: row.get(5)?,
        is_active: row.get(6)?,
        joined_at: row.get(7)?,
        last_active_at: row.get(8)?,
    })
}

/// Inserts a new recipient, active, joined now.
///
/// Fails with a constraint error if the handle is already registered.
pub fn create_recipient(conn: &Connection, new: &NewRecipient) -> AppResult<Recipient> {
    let ts = now();
    conn.execute(
        "INSERT INTO users (telegram_id, username, first_name, last_name, is_active, joined_at, last_active_at) \
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        params![new.telegram_id, new.username, new.first_name, new.last_name, ts],
    )?;
    let id = conn.last_insert_rowid();
    Ok(Recipient {
        id,
        telegram_id: new.telegram_id.clone(),
        username: new.username.clone(),
        first_name: new.first_name.clone(),
        last_name: new.last_name.clone(),
        phone_number: None,
        is_active: true,
        joined_at: ts,
        last_active_at: ts,
    })
}

pub fn get_recipient(conn: &Connection, id: i64) -> AppResult<Option<Recipient>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", COLUMNS);
    Ok(conn.query_row(&sql, [id], from_row).optional()?)
}

pub fn get_recipient_by_handle(conn: &Connection, telegram_id: &str) -> AppResult<Option<Recipient>> {
    let sql = format!("SELECT {} FROM users WHERE telegram_id = ?1", COLUMNS);
    Ok(conn.query_row(&sql, [telegram_id], from_row).optional()?)
}

/// Bumps `last_active_at`. Returns false if the handle is unknown.
pub fn touch_recipient(conn: &Connection, telegram_id: &str) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE users SET last_active_at = ?1 WHERE telegram_id = ?2",
        params![now(), telegram_id],
    )?;
    Ok(changed > 0)
}

/// Stores the shared phone number and bumps `last_active_at`.
/// Returns false if the handle is unknown.
pub fn update_phone(conn: &Connection, telegram_id: &str, phone_number: &str) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE users SET phone_number = ?1, last_active_at = ?2 WHERE telegram_id = ?3",
        params![phone_number, now(), telegram_id],
    )?;
    Ok(changed > 0)
}

/// Operator toggle of the active flag. Returns false if the id is unknown.
pub fn set_active(conn: &Connection, id: i64, is_active: bool) -> AppResult<bool> {
    let changed = conn.execute("UPDATE users SET is_active = ?1 WHERE id = ?2", params![is_active, id])?;
    Ok(changed > 0)
}

/// Self-service toggle from the bot (`/unsubscribe`).
pub fn set_active_by_handle(conn: &Connection, telegram_id: &str, is_active: bool) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE users SET is_active = ?1, last_active_at = ?2 WHERE telegram_id = ?3",
        params![is_active, now(), telegram_id],
    )?;
    Ok(changed > 0)
}

/// Removes a recipient and, through the foreign key, its delivery records.
pub fn delete_recipient(conn: &Connection, id: i64) -> AppResult<bool> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    Ok(changed > 0)
}

/// All recipients, newest first.
pub fn list_recipients(conn: &Connection) -> AppResult<Vec<Recipient>> {
    let sql = format!("SELECT {} FROM users ORDER BY joined_at DESC, id DESC", COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Active recipients, newest first. This is the dispatch input.
pub fn list_active_recipients(conn: &Connection) -> AppResult<Vec<Recipient>> {
    let sql = format!(
        "SELECT {} FROM users WHERE is_active = 1 ORDER BY joined_at DESC, id DESC",
        COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count_active_recipients(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM users WHERE is_active = 1", [], |row| row.get(0))?)
}

/// Start of the UTC day containing `at`.
pub(crate) fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), 0, 0, 0)
        .single()
        .unwrap_or(at)
}

/// Active-user counts relative to `at`.
pub fn recipient_stats(conn: &Connection, at: DateTime<Utc>) -> AppResult<RecipientStats> {
    let today = start_of_day(at);
    let month_start = Utc
        .with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(today);

    let total = count_active_recipients(conn)?;
    let active_today = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_active = 1 AND last_active_at >= ?1",
        [today],
        |row| row.get(0),
    )?;
    let new_this_month = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_active = 1 AND joined_at >= ?1",
        [month_start],
        |row| row.get(0),
    )?;

    Ok(RecipientStats {
        total,
        active_today,
        new_this_month,
    })
}
