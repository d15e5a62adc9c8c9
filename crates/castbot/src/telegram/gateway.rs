//! teloxide-backed `MessagingGateway`.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ButtonRequest, InputFile, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup};

use castcore::gateway::{BotInfo, GatewayError, MessagingGateway, ReplyKeyboard};

/// Sends through the Telegram Bot API. Recipient handles are chat ids.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Parses a stored handle into a chat id.
pub fn chat_id(recipient: &str) -> Result<ChatId, GatewayError> {
    recipient
        .trim()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| GatewayError::InvalidRecipient(recipient.to_string()))
}

/// Telegram markup for a keyboard choice.
pub fn reply_markup(keyboard: &ReplyKeyboard) -> Option<ReplyMarkup> {
    match keyboard {
        ReplyKeyboard::None => None,
        ReplyKeyboard::RequestContact(label) => Some(ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![vec![KeyboardButton::new(label.clone()).request(ButtonRequest::Contact)]])
                .resize_keyboard()
                .one_time_keyboard(),
        )),
        ReplyKeyboard::Remove => Some(ReplyMarkup::KeyboardRemove(KeyboardRemove::new())),
    }
}

fn request_error(e: teloxide::RequestError) -> GatewayError {
    GatewayError::Request(e.to_string())
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_text(&self, recipient: &str, text: &str, keyboard: &ReplyKeyboard) -> Result<(), GatewayError> {
        let chat = chat_id(recipient)?;
        let mut request = self.bot.send_message(chat, text);
        if let Some(markup) = reply_markup(keyboard) {
            request = request.reply_markup(markup);
        }
        request.await.map(|_| ()).map_err(request_error)
    }

    async fn send_photo(
        &self,
        recipient: &str,
        photo_url: &str,
        caption: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<(), GatewayError> {
        let chat = chat_id(recipient)?;
        let url = url::Url::parse(photo_url).map_err(|e| GatewayError::Request(format!("invalid photo URL: {}", e)))?;
        let mut request = self.bot.send_photo(chat, InputFile::url(url)).caption(caption);
        if let Some(markup) = reply_markup(keyboard) {
            request = request.reply_markup(markup);
        }
        request.await.map(|_| ()).map_err(request_error)
    }

    async fn bot_info(&self) -> Result<BotInfo, GatewayError> {
        let me = self.bot.get_me().await.map_err(request_error)?;
        Ok(BotInfo {
            id: i64::try_from(me.user.id.0).unwrap_or_default(),
            username: me.user.username.clone(),
            first_name: me.user.first_name.clone(),
        })
    }
}
