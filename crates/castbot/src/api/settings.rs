//! Bot settings endpoints: typed welcome settings, generic key/value rows and
//! the welcome test send.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use castcore::registration::{send_welcome, WelcomeDelivery};
use castcore::storage::db::get_connection;
use castcore::storage::settings::{get_setting, load_welcome, save_welcome as store_welcome, set_setting};
use castcore::storage::WelcomeSettings;
use castcore::AppError;

use super::error::{ApiError, ApiResult, CoreResultExt};
use super::{AppState, MessageResponse};

#[derive(Debug, Default, Deserialize)]
pub struct SettingPayload {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWelcomePayload {
    #[serde(default)]
    pub chat_id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct TestWelcomeResponse {
    pub success: bool,
    pub message: &'static str,
    pub settings: WelcomeSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/settings/welcome
pub async fn get_welcome(State(state): State<AppState>) -> ApiResult<Json<WelcomeSettings>> {
    let conn = get_connection(&state.db).context("Failed to fetch welcome message settings")?;
    let settings = load_welcome(&conn).context("Failed to fetch welcome message settings")?;
    Ok(Json(settings))
}

/// POST /api/settings/welcome
pub async fn save_welcome(
    State(state): State<AppState>,
    payload: Result<Json<WelcomeSettings>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(settings) = payload?;
    let mut conn = get_connection(&state.db).context("Failed to update welcome message settings")?;
    store_welcome(&mut conn, &settings).context("Failed to update welcome message settings")?;
    log::info!("Welcome message settings updated");
    Ok(MessageResponse::new("Welcome message settings updated successfully"))
}

/// GET /api/settings/{key}
pub async fn get_one(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<Value>> {
    let conn = get_connection(&state.db).context("Failed to fetch setting")?;
    let setting = get_setting(&conn, &key).context("Failed to fetch setting")?;
    let body = match setting {
        Some(setting) => serde_json::to_value(setting)
            .map_err(AppError::from)
            .context("Failed to fetch setting")?,
        None => json!({"key": key, "value": null}),
    };
    Ok(Json(body))
}

/// POST /api/settings with `{"key": "...", "value": ...}`.
///
/// Non-string values are stored as their JSON text.
pub async fn set_one(
    State(state): State<AppState>,
    payload: Result<Json<SettingPayload>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let key = body.key.filter(|k| !k.trim().is_empty());
    let (Some(key), Some(value)) = (key, body.value.filter(|v| !v.is_null())) else {
        return Err(ApiError::BadRequest("Key and value are required".to_string()));
    };
    let value = match value {
        Value::String(s) => s,
        other => other.to_string(),
    };

    let conn = get_connection(&state.db).context("Failed to update setting")?;
    let setting = set_setting(&conn, &key, &value).context("Failed to update setting")?;
    let body = serde_json::to_value(setting)
        .map_err(AppError::from)
        .context("Failed to update setting")?;
    Ok(Json(body))
}

/// Normalises a chat id given as a JSON string or number.
fn chat_handle(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// POST /api/test/welcome-message with `{"chatId": ...}`.
///
/// Sends the current welcome content to one chat with the same photo-to-text
/// fallback new recipients get.
pub async fn test_welcome(
    State(state): State<AppState>,
    payload: Result<Json<TestWelcomePayload>, JsonRejection>,
) -> ApiResult<Json<TestWelcomeResponse>> {
    let Json(body) = payload?;
    let chat_id = chat_handle(body.chat_id)
        .ok_or_else(|| ApiError::BadRequest("Chat ID is required for testing".to_string()))?;

    let settings = {
        let conn = get_connection(&state.db).context("Failed to test welcome message")?;
        load_welcome(&conn).context("Failed to test welcome message")?
    };

    let delivery = send_welcome(state.gateway().as_ref(), &chat_id, &settings)
        .await
        .map_err(AppError::from)
        .context("Failed to test welcome message")?;

    let (success, message, error) = match delivery {
        WelcomeDelivery::Photo => (true, "Test image sent successfully", None),
        WelcomeDelivery::TextFallback(err) => (false, "Image failed, text sent instead", Some(err)),
        WelcomeDelivery::Text => (true, "Text message sent (no image configured)", None),
    };
    Ok(Json(TestWelcomeResponse {
        success,
        message,
        settings,
        error,
    }))
}
