use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::core::error::AppResult;
use crate::core::types::BroadcastStatus;
use crate::storage::broadcasts::count_broadcasts_with_status;
use crate::storage::deliveries::delivery_totals;
use crate::storage::recipients::{count_active_recipients, start_of_day};

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Active recipients
    pub total_users: i64,
    /// Broadcasts that reached `sent`
    pub messages_sent: i64,
    /// Percentage of delivery records that are `delivered`, one decimal
    pub delivery_rate: f64,
    /// Active recipients seen since the start of the UTC day
    pub active_today: i64,
}

pub fn dashboard_stats(conn: &Connection, at: DateTime<Utc>) -> AppResult<DashboardStats> {
    let total_users = count_active_recipients(conn)?;
    let messages_sent = count_broadcasts_with_status(conn, BroadcastStatus::Sent)?;
    let active_today = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE is_active = 1 AND last_active_at >= ?1",
        [start_of_day(at)],
        |row| row.get(0),
    )?;
    let (delivered, total) = delivery_totals(conn)?;

    Ok(DashboardStats {
        total_users,
        messages_sent,
        delivery_rate: delivery_rate(delivered, total),
        active_today,
    })
}

fn delivery_rate(delivered: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = delivered as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}
