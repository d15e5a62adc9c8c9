//! Key/value bot settings and the typed welcome record built on them.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::core::config::limits;
use crate::core::error::{AppResult, Validator};
use crate::storage::db::now;

pub const WELCOME_TITLE_KEY: &str = "welcome_title";
pub const WELCOME_DESCRIPTION_KEY: &str = "welcome_description";
pub const WELCOME_BUTTON_TEXT_KEY: &str = "welcome_button_text";
pub const WELCOME_IMAGE_URL_KEY: &str = "welcome_image_url";

pub const DEFAULT_WELCOME_TITLE: &str = "🤖 Welcome to our Broadcast Bot!";
pub const DEFAULT_WELCOME_DESCRIPTION: &str =
    "To complete your registration and receive real-time notifications, please share your phone number.";
pub const DEFAULT_WELCOME_BUTTON_TEXT: &str = "📱 Share My Contact";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotSetting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

pub fn get_setting(conn: &Connection, key: &str) -> AppResult<Option<BotSetting>> {
    Ok(conn
        .query_row(
            "SELECT key, value, updated_at FROM bot_settings WHERE key = ?1",
            [key],
            |row| {
                Ok(BotSetting {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            },
        )
        .optional()?)
}

/// Inserts or replaces the value stored under `key`.
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> AppResult<BotSetting> {
    let updated_at = now();
    conn.execute(
        "INSERT INTO bot_settings (key, value, updated_at) VALUES (?1, ?2, ?3) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key, value, updated_at],
    )?;
    Ok(BotSetting {
        key: key.to_string(),
        value: value.to_string(),
        updated_at,
    })
}

/// Content of the message a new recipient receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeSettings {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub button_text: String,
    #[serde(default)]
    pub image_url: String,
}

impl Default for WelcomeSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_WELCOME_TITLE.to_string(),
            description: DEFAULT_WELCOME_DESCRIPTION.to_string(),
            button_text: DEFAULT_WELCOME_BUTTON_TEXT.to_string(),
            image_url: String::new(),
        }
    }
}

impl WelcomeSettings {
    /// Text (or photo caption) of the welcome message.
    pub fn caption(&self) -> String {
        format!("{}\n\n{}", self.title, self.description)
    }

    /// Trimmed image URL, `None` when blank.
    pub fn image(&self) -> Option<&str> {
        Some(self.image_url.trim()).filter(|s| !s.is_empty())
    }

    pub fn validate(&self) -> AppResult<()> {
        let mut v = Validator::new();
        v.text("title", &self.title, limits::MAX_TITLE_CHARS);
        v.text("description", &self.description, limits::MAX_CAPTION_CHARS);
        v.text("buttonText", &self.button_text, limits::MAX_BUTTON_CHARS);
        if self.caption().chars().count() > limits::MAX_CAPTION_CHARS {
            v.reject(
                "description",
                format!(
                    "title and description together must be at most {} characters",
                    limits::MAX_CAPTION_CHARS
                ),
            );
        }
        if let Some(raw) = self.image() {
            match url::Url::parse(raw) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                _ => v.reject("imageUrl", "imageUrl must be an http(s) URL"),
            }
        }
        v.finish("Validation error")
    }
}

/// Current welcome settings; missing or blank rows fall back to defaults.
pub fn load_welcome(conn: &Connection) -> AppResult<WelcomeSettings> {
    let defaults = WelcomeSettings::default();
    let value = |key: &str, fallback: String| -> AppResult<String> {
        Ok(get_setting(conn, key)?
            .map(|s| s.value)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(fallback))
    };

    Ok(WelcomeSettings {
        title: value(WELCOME_TITLE_KEY, defaults.title)?,
        description: value(WELCOME_DESCRIPTION_KEY, defaults.description)?,
        button_text: value(WELCOME_BUTTON_TEXT_KEY, defaults.button_text)?,
        image_url: value(WELCOME_IMAGE_URL_KEY, defaults.image_url)?,
    })
}

/// Validates and stores all four welcome rows in one transaction.
pub fn save_welcome(conn: &mut Connection, settings: &WelcomeSettings) -> AppResult<()> {
    settings.validate()?;
    let tx = conn.transaction()?;
    set_setting(&tx, WELCOME_TITLE_KEY, &settings.title)?;
    set_setting(&tx, WELCOME_DESCRIPTION_KEY, &settings.description)?;
    set_setting(&tx, WELCOME_BUTTON_TEXT_KEY, &settings.button_text)?;
    set_setting(&tx, WELCOME_IMAGE_URL_KEY, settings.image_url.trim())?;
    tx.commit()?;
    Ok(())
}
