//! Scheduled message endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;

use castcore::storage::db::get_connection;
use castcore::storage::scheduled::{
    cancel_scheduled, create_scheduled, delete_scheduled, get_scheduled, list_scheduled, update_scheduled,
};
use castcore::storage::{NewScheduledMessage, ScheduledMessage, ScheduledUpdate};

use super::error::{ApiError, ApiResult, CoreResultExt};
use super::{parse_id, AppState, MessageResponse};

/// GET /api/scheduled-messages
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<ScheduledMessage>>> {
    let conn = get_connection(&state.db).context("Failed to fetch scheduled messages")?;
    let messages = list_scheduled(&conn).context("Failed to fetch scheduled messages")?;
    Ok(Json(messages))
}

/// POST /api/scheduled-messages
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewScheduledMessage>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ScheduledMessage>)> {
    let Json(new) = payload?;
    let conn = get_connection(&state.db).context("Failed to create scheduled message")?;
    let scheduled = create_scheduled(&conn, &new).context("Failed to create scheduled message")?;
    log::info!(
        "Scheduled message {} for {} ({} recipient(s) now)",
        scheduled.id,
        scheduled.scheduled_for,
        scheduled.recipient_count
    );
    Ok((StatusCode::CREATED, Json(scheduled)))
}

/// GET /api/scheduled-messages/{id}
pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ScheduledMessage>> {
    let id = parse_id(&id)?;
    let conn = get_connection(&state.db).context("Failed to fetch scheduled message")?;
    get_scheduled(&conn, id)
        .context("Failed to fetch scheduled message")?
        .map(Json)
        .ok_or(ApiError::NotFound("Scheduled message"))
}

/// PATCH /api/scheduled-messages/{id}
///
/// Returns the updated message.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ScheduledUpdate>, JsonRejection>,
) -> ApiResult<Json<ScheduledMessage>> {
    let id = parse_id(&id)?;
    let Json(update) = payload?;
    let conn = get_connection(&state.db).context("Failed to update scheduled message")?;
    let updated = update_scheduled(&conn, id, &update).context("Failed to update scheduled message")?;
    Ok(Json(updated))
}

/// PATCH /api/scheduled-messages/{id}/cancel
pub async fn cancel(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    let conn = get_connection(&state.db).context("Failed to cancel scheduled message")?;
    cancel_scheduled(&conn, id).context("Failed to cancel scheduled message")?;
    log::info!("Cancelled scheduled message {}", id);
    Ok(MessageResponse::new("Scheduled message cancelled successfully"))
}

/// DELETE /api/scheduled-messages/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    let conn = get_connection(&state.db).context("Failed to delete scheduled message")?;
    if !delete_scheduled(&conn, id).context("Failed to delete scheduled message")? {
        return Err(ApiError::NotFound("Scheduled message"));
    }
    Ok(MessageResponse::new("Scheduled message deleted successfully"))
}
