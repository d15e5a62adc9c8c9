//! Recipient management endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::Value;

use castcore::storage::db::{get_connection, now};
use castcore::storage::recipients::{
    delete_recipient, get_recipient, list_recipients, recipient_stats, set_active,
};
use castcore::storage::{Recipient, RecipientStats};

use super::error::{ApiError, ApiResult, CoreResultExt};
use super::{parse_id, AppState, MessageResponse};

/// GET /api/users
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Recipient>>> {
    let conn = get_connection(&state.db).context("Failed to fetch users")?;
    let users = list_recipients(&conn).context("Failed to fetch users")?;
    Ok(Json(users))
}

/// GET /api/users/stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<RecipientStats>> {
    let conn = get_connection(&state.db).context("Failed to fetch user stats")?;
    let stats = recipient_stats(&conn, now()).context("Failed to fetch user stats")?;
    Ok(Json(stats))
}

/// GET /api/users/{id}
pub async fn get_one(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Recipient>> {
    let id = parse_id(&id)?;
    let conn = get_connection(&state.db).context("Failed to fetch user")?;
    get_recipient(&conn, id)
        .context("Failed to fetch user")?
        .map(Json)
        .ok_or(ApiError::NotFound("User"))
}

/// PATCH /api/users/{id} and /api/users/{id}/status with `{"isActive": bool}`.
pub async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    let Json(body) = payload?;
    let is_active = body
        .get("isActive")
        .and_then(Value::as_bool)
        .ok_or_else(|| ApiError::BadRequest("isActive must be a boolean".to_string()))?;

    let conn = get_connection(&state.db).context("Failed to update user status")?;
    if !set_active(&conn, id, is_active).context("Failed to update user status")? {
        return Err(ApiError::NotFound("User"));
    }

    log::info!("User {} {}", id, if is_active { "activated" } else { "deactivated" });
    Ok(MessageResponse::new(if is_active {
        "User activated"
    } else {
        "User deactivated"
    }))
}

/// DELETE /api/users/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id(&id)?;
    let conn = get_connection(&state.db).context("Failed to remove user")?;
    if !delete_recipient(&conn, id).context("Failed to remove user")? {
        return Err(ApiError::NotFound("User"));
    }
    Ok(MessageResponse::new("User removed successfully"))
}
