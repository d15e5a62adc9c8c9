//! Dashboard overview endpoints.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use castcore::storage::db::{get_connection, now};
use castcore::storage::stats::dashboard_stats;
use castcore::storage::DashboardStats;

use super::error::{ApiResult, CoreResultExt};
use super::AppState;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BotStatus {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub is_online: bool,
}

/// GET /api/dashboard/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let conn = get_connection(&state.db).context("Failed to fetch stats")?;
    let stats = dashboard_stats(&conn, now()).context("Failed to fetch stats")?;
    Ok(Json(stats))
}

/// GET /api/bot/status
///
/// An unreachable or disabled bot is reported as offline, not as an error.
pub async fn bot_status(State(state): State<AppState>) -> Json<BotStatus> {
    let status = match state.gateway().bot_info().await {
        Ok(info) => BotStatus {
            username: info.username,
            first_name: Some(info.first_name),
            is_online: true,
        },
        Err(e) => {
            log::warn!("Bot status check failed: {}", e);
            BotStatus {
                username: None,
                first_name: None,
                is_online: false,
            }
        }
    };
    Json(status)
}
