//! Messaging gateway abstraction.
//!
//! The core never talks to Telegram directly: registration, dispatch and the
//! sweep hold an `Arc<dyn MessagingGateway>`. The teloxide implementation
//! lives in the bot crate; [`DisabledGateway`] stands in when the bot could
//! not be initialised.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Failure of a single outbound call.
///
/// `Display` is the bare error text; it is what ends up in a failed delivery
/// record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No bot token, or the bot failed to start.
    #[error("bot not initialized")]
    Disabled,

    /// The recipient handle is not something the platform can address.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    /// The platform rejected or failed the request.
    #[error("{0}")]
    Request(String),
}

/// Custom keyboard attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReplyKeyboard {
    /// Leave the recipient's keyboard as it is.
    #[default]
    None,
    /// One-time keyboard with a single request-contact button.
    RequestContact(String),
    /// Remove a previously shown custom keyboard.
    Remove,
}

/// Identity of the bot account, for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotInfo {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

/// Outbound side of the messaging platform.
///
/// `recipient` is the opaque handle stored on the recipient row.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(&self, recipient: &str, text: &str, keyboard: &ReplyKeyboard) -> Result<(), GatewayError>;

    async fn send_photo(
        &self,
        recipient: &str,
        photo_url: &str,
        caption: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<(), GatewayError>;

    /// Who the bot is, or an error when it is unreachable.
    async fn bot_info(&self) -> Result<BotInfo, GatewayError>;

    /// False for [`DisabledGateway`].
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Gateway used in degraded mode: every call fails with
/// [`GatewayError::Disabled`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGateway;

#[async_trait]
impl MessagingGateway for DisabledGateway {
    async fn send_text(&self, _recipient: &str, _text: &str, _keyboard: &ReplyKeyboard) -> Result<(), GatewayError> {
        Err(GatewayError::Disabled)
    }

    async fn send_photo(
        &self,
        _recipient: &str,
        _photo_url: &str,
        _caption: &str,
        _keyboard: &ReplyKeyboard,
    ) -> Result<(), GatewayError> {
        Err(GatewayError::Disabled)
    }

    async fn bot_info(&self) -> Result<BotInfo, GatewayError> {
        Err(GatewayError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
