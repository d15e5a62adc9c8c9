//! Broadcast endpoints: CRUD, send, quick send and delivery records.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use castcore::config::limits;
use castcore::core::types::BroadcastStatus;
use castcore::storage::broadcasts::{
    claim_broadcast, create_broadcast, delete_broadcast, get_broadcast, list_broadcasts, set_broadcast_status,
};
use castcore::storage::db::{get_connection, now};
use castcore::storage::deliveries::list_deliveries;
use castcore::storage::recipients::{count_active_recipients, list_active_recipients};
use castcore::storage::{Broadcast, DbConnection, Delivery, NewBroadcast};
use castcore::AppResult;

use super::error::{ApiError, ApiResult, CoreResultExt};
use super::{parse_id, AppState, MessageResponse};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuickBroadcast {
    #[serde(default)]
    pub message: Option<String>,
}

/// Acknowledgement for a dispatch that was started in the background.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchStarted {
    pub message: &'static str,
    pub broadcast_id: i64,
    pub recipient_count: usize,
}

/// GET /api/broadcasts[?limit=N]
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Broadcast>>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let limit = query.limit.map(|l| l.min(limits::MAX_LIST_LIMIT));

    let conn = get_connection(&state.db).context("Failed to fetch broadcasts")?;
    let broadcasts = list_broadcasts(&conn, limit).context("Failed to fetch broadcasts")?;
    Ok(Json(broadcasts))
}

/// POST /api/broadcasts
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewBroadcast>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Broadcast>)> {
    let Json(new) = payload?;
    let conn = get_connection(&state.db).context("Failed to create broadcast")?;
    let broadcast = create_broadcast(&conn, &new).context("Failed to create broadcast")?;
    log::info!("Created broadcast {} ({})", broadcast.id, broadcast.status);
    Ok((StatusCode::CREATED, Json(broadcast)))
}

/// GET /api/broadcasts/{id}
pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Broadcast>> {
    let id = parse_id(&id)?;
    let conn = get_connection(&state.db).context("Failed to fetch broadcast")?;
    get_broadcast(&conn, id)
        .context("Failed to fetch broadcast")?
        .map(Json)
        .ok_or(ApiError::NotFound("Broadcast"))
}

/// DELETE /api/broadcasts/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    let conn = get_connection(&state.db).context("Failed to delete broadcast")?;
    if !delete_broadcast(&conn, id).context("Failed to delete broadcast")? {
        return Err(ApiError::NotFound("Broadcast"));
    }
    Ok(MessageResponse::new("Broadcast deleted successfully"))
}

/// POST /api/broadcasts/{id}/send
///
/// Claims the draft and hands it to the dispatcher; the response does not
/// wait for the run.
pub async fn send(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<DispatchStarted>> {
    let id = parse_id(&id)?;
    let conn = get_connection(&state.db).context("Failed to send broadcast")?;

    let broadcast = get_broadcast(&conn, id)
        .context("Failed to send broadcast")?
        .ok_or(ApiError::NotFound("Broadcast"))?;
    if broadcast.status != BroadcastStatus::Draft {
        return Err(not_sendable(broadcast.status));
    }
    if !claim_broadcast(&conn, id).context("Failed to send broadcast")? {
        return Err(not_sendable(BroadcastStatus::Sending));
    }

    let recipient_count = start_claimed(&state, &conn, id, broadcast.message).context("Failed to send broadcast")?;
    Ok(Json(DispatchStarted {
        message: "Broadcast started",
        broadcast_id: id,
        recipient_count,
    }))
}

fn not_sendable(status: BroadcastStatus) -> ApiError {
    let message = match status {
        BroadcastStatus::Sent => "Broadcast has already been sent".to_string(),
        BroadcastStatus::Sending => "Broadcast is already being sent".to_string(),
        other => format!("Only draft broadcasts can be sent (status: {})", other),
    };
    ApiError::BadRequest(message)
}

/// Loads the active recipients for a claimed broadcast and spawns the run.
///
/// The broadcast is already `sending`; if the recipients cannot be loaded it
/// is moved to `failed` so it does not stay claimed.
fn start_claimed(state: &AppState, conn: &DbConnection, id: i64, message: String) -> AppResult<usize> {
    let recipients = match list_active_recipients(conn) {
        Ok(recipients) => recipients,
        Err(e) => {
            log::error!("Could not load recipients for broadcast {}: {}", id, e);
            if let Err(mark) = set_broadcast_status(conn, id, BroadcastStatus::Failed) {
                log::error!("Could not mark broadcast {} as failed: {}", id, mark);
            }
            return Err(e);
        }
    };

    let recipient_count = recipients.len();
    state.dispatcher.spawn(id, message, recipients);
    Ok(recipient_count)
}

/// POST /api/broadcasts/quick with `{"message": "..."}`.
pub async fn quick(
    State(state): State<AppState>,
    payload: Result<Json<QuickBroadcast>, JsonRejection>,
) -> ApiResult<Json<DispatchStarted>> {
    let Json(body) = payload?;
    let message = body.message.as_deref().map(str::trim).unwrap_or_default();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }

    let conn = get_connection(&state.db).context("Failed to send quick broadcast")?;
    if count_active_recipients(&conn).context("Failed to send quick broadcast")? == 0 {
        return Err(ApiError::BadRequest("No active users to send message to".to_string()));
    }

    let title = format!("Quick Broadcast - {}", now().format("%Y-%m-%d %H:%M:%S UTC"));
    let broadcast =
        create_broadcast(&conn, &NewBroadcast::new(title, message)).context("Failed to send quick broadcast")?;
    if !claim_broadcast(&conn, broadcast.id).context("Failed to send quick broadcast")? {
        return Err(not_sendable(BroadcastStatus::Sending));
    }

    let recipient_count =
        start_claimed(&state, &conn, broadcast.id, broadcast.message).context("Failed to send quick broadcast")?;

    Ok(Json(DispatchStarted {
        message: "Quick broadcast started",
        broadcast_id: broadcast.id,
        recipient_count,
    }))
}

/// GET /api/broadcasts/{id}/deliveries
pub async fn deliveries(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<Delivery>>> {
    let id = parse_id(&id)?;
    let conn = get_connection(&state.db).context("Failed to fetch deliveries")?;
    if get_broadcast(&conn, id).context("Failed to fetch deliveries")?.is_none() {
        return Err(ApiError::NotFound("Broadcast"));
    }
    let records = list_deliveries(&conn, id).context("Failed to fetch deliveries")?;
    Ok(Json(records))
}
