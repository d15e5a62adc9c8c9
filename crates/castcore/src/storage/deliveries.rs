//! Per-recipient delivery records.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::core::error::AppResult;
use crate::core::types::DeliveryStatus;
use crate::storage::db::now;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: i64,
    pub broadcast_id: i64,
    pub user_id: i64,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Inserts one delivery record and returns its id.
///
/// `sent` and `delivered` stamp `sent_at`; `failed` keeps the error text.
pub fn insert_delivery(
    conn: &Connection,
    broadcast_id: i64,
    user_id: i64,
    status: DeliveryStatus,
    error_message: Option<&str>,
) -> AppResult<i64> {
    let sent_at = match status {
        DeliveryStatus::Failed => None,
        _ => Some(now()),
    };
    conn.execute(
        "INSERT INTO message_deliveries (broadcast_id, user_id, status, error_message, sent_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![broadcast_id, user_id, status, error_message, sent_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Moves a record to `status`; `delivered` stamps `delivered_at`.
pub fn update_delivery_status(
    conn: &Connection,
    id: i64,
    status: DeliveryStatus,
    error_message: Option<&str>,
) -> AppResult<()> {
    let delivered_at = (status == DeliveryStatus::Delivered).then(now);
    conn.execute(
        "UPDATE message_deliveries \
         SET status = ?1, error_message = COALESCE(?2, error_message), \
             delivered_at = COALESCE(?3, delivered_at) \
         WHERE id = ?4",
        params![status, error_message, delivered_at, id],
    )?;
    Ok(())
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Delivery> {
    Ok(Delivery {
        id: row.get(0)?,
        broadcast_id: row.get(1)?,
        user_id: row.get(2)?,
        status: row.get(3)?,
        error_message: row.get(4)?,
        sent_at: row.get(5)?,
        delivered_at: row.get(6)?,
    })
}

/// Records of one broadcast in insertion order.
pub fn list_deliveries(conn: &Connection, broadcast_id: i64) -> AppResult<Vec<Delivery>> {
    let mut stmt = conn.prepare(
        "SELECT id, broadcast_id, user_id, status, error_message, sent_at, delivered_at \
         FROM message_deliveries WHERE broadcast_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([broadcast_id], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// (delivered, total) across every broadcast.
pub fn delivery_totals(conn: &Connection) -> AppResult<(i64, i64)> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(CASE WHEN status = 'delivered' THEN 1 ELSE 0 END), 0), COUNT(*) \
         FROM message_deliveries",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}
