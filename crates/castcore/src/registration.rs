//! Recipient registration through bot commands.
//!
//! Reacts to "start", "contact shared" and the small self-service commands.
//! Outbound send failures are logged and swallowed: a recipient row is
//! never rolled back because a reply could not be delivered.

use std::sync::Arc;

use crate::core::error::AppResult;
use crate::gateway::{GatewayError, MessagingGateway, ReplyKeyboard};
use crate::storage::recipients::{
    create_recipient, get_recipient_by_handle, set_active_by_handle, touch_recipient, update_phone, NewRecipient,
    Recipient,
};
use crate::storage::settings::{load_welcome, WelcomeSettings, DEFAULT_WELCOME_BUTTON_TEXT};
use crate::storage::{get_connection, DbPool};

pub const WELCOME_BACK_TEXT: &str = "👋 Welcome back!\n\n\
     To ensure you receive important notifications, please share your phone number.\n\n\
     Click the button below to complete your profile.";

pub const PHONE_SAVED_TEXT: &str =
    "✅ Thank you! Your phone number has been saved.\n\nWaiting for important announcements.";

pub const START_FIRST_TEXT: &str = "Please send /start to register before sharing your contact.";

pub const HELP_TEXT: &str = "📋 Available Commands:\n\n\
     /start - Register for broadcasts\n\
     /help - Show this help message\n\
     /status - Check your registration status\n\
     /unsubscribe - Stop receiving broadcasts\n\n\
     For questions or support, contact our administrators.";

pub const STATUS_ACTIVE_TEXT: &str = "✅ You are registered and will receive broadcasts.";
pub const STATUS_INACTIVE_TEXT: &str = "❌ You are not registered. Use /start to register.";
pub const UNSUBSCRIBED_TEXT: &str = "✅ You have been unsubscribed from broadcasts.";
pub const NOT_REGISTERED_TEXT: &str = "You were not registered for broadcasts.";

const START_APOLOGY_TEXT: &str = "Sorry, there was an error registering you. Please try again later.";
const CONTACT_APOLOGY_TEXT: &str = "Sorry, there was an error saving your phone number. Please try again.";
const STATUS_APOLOGY_TEXT: &str = "Sorry, unable to check your status right now.";
const UNSUBSCRIBE_APOLOGY_TEXT: &str = "Sorry, unable to unsubscribe you right now.";

/// What a start event did.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// First contact; a recipient row was created.
    Registered(Recipient),
    /// The handle was already known.
    Returning(Recipient),
}

/// How the welcome content actually went out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WelcomeDelivery {
    /// Photo with caption.
    Photo,
    /// No image configured; caption sent as text.
    Text,
    /// The photo failed with the given error and the caption went out as text.
    TextFallback(String),
}

/// Sends welcome content to `recipient`.
///
/// With an image configured this tries `send_photo` first and falls back to
/// exactly one `send_text` with the same caption and keyboard.
pub async fn send_welcome(
    gateway: &dyn MessagingGateway,
    recipient: &str,
    settings: &WelcomeSettings,
) -> Result<WelcomeDelivery, GatewayError> {
    let caption = settings.caption();
    let keyboard = ReplyKeyboard::RequestContact(settings.button_text.clone());

    match settings.image() {
        Some(url) => match gateway.send_photo(recipient, url, &caption, &keyboard).await {
            Ok(()) => Ok(WelcomeDelivery::Photo),
            Err(photo_err) => {
                log::warn!(
                    "Welcome photo to {} failed ({}), falling back to text",
                    recipient,
                    photo_err
                );
                gateway.send_text(recipient, &caption, &keyboard).await?;
                Ok(WelcomeDelivery::TextFallback(photo_err.to_string()))
            }
        },
        None => {
            gateway.send_text(recipient, &caption, &keyboard).await?;
            Ok(WelcomeDelivery::Text)
        }
    }
}

/// Handles inbound registration events for one bot.
#[derive(Clone)]
pub struct RegistrationHandler {
    pool: Arc<DbPool>,
    gateway: Arc<dyn MessagingGateway>,
}

impl RegistrationHandler {
    pub fn new(pool: Arc<DbPool>, gateway: Arc<dyn MessagingGateway>) -> Self {
        Self { pool, gateway }
    }

    /// "start" event.
    ///
    /// Unknown handle: create the recipient, then send the welcome content.
    /// Known handle: bump activity and either re-prompt for the phone number
    /// or acknowledge. A recipient that unsubscribed is re-activated.
    pub async fn handle_start(&self, profile: &NewRecipient) -> AppResult<StartOutcome> {
        let handle = profile.telegram_id.as_str();
        match self.start_inner(profile).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                log::error!("Failed to register {}: {}", handle, e);
                self.reply(handle, START_APOLOGY_TEXT, &ReplyKeyboard::None).await;
                Err(e)
            }
        }
    }

    async fn start_inner(&self, profile: &NewRecipient) -> AppResult<StartOutcome> {
        let handle = profile.telegram_id.as_str();
        let (outcome, welcome) = {
            let conn = get_connection(&self.pool)?;
            match get_recipient_by_handle(&conn, handle)? {
                None => {
                    let recipient = create_recipient(&conn, profile)?;
                    let welcome = load_welcome(&conn)?;
                    (StartOutcome::Registered(recipient), Some(welcome))
                }
                Some(existing) => {
                    touch_recipient(&conn, handle)?;
                    if !existing.is_active {
                        set_active_by_handle(&conn, handle, true)?;
                        log::info!("Recipient {} re-activated by /start", handle);
                    }
                    let refreshed = get_recipient_by_handle(&conn, handle)?.unwrap_or(existing);
                    (StartOutcome::Returning(refreshed), None)
                }
            }
        };

        match (&outcome, welcome) {
            (StartOutcome::Registered(recipient), Some(settings)) => {
                log::info!("New recipient registered: {} ({})", recipient.display_name(), handle);
                match send_welcome(self.gateway.as_ref(), handle, &settings).await {
                    Ok(delivery) => log::info!("Welcome sent to {}: {:?}", handle, delivery),
                    Err(e) => log::warn!("Welcome to {} failed: {}", handle, e),
                }
            }
            (StartOutcome::Returning(recipient), _) if recipient.phone_number.is_none() => {
                let keyboard = ReplyKeyboard::RequestContact(DEFAULT_WELCOME_BUTTON_TEXT.to_string());
                self.reply(handle, WELCOME_BACK_TEXT, &keyboard).await;
            }
            _ => {
                self.reply(handle, PHONE_SAVED_TEXT, &ReplyKeyboard::Remove).await;
            }
        }

        Ok(outcome)
    }

    /// "contact shared" event. Returns false when the handle is unknown, in
    /// which case no row is created and the user is asked to /start first.
    pub async fn handle_contact(&self, handle: &str, phone_number: &str) -> AppResult<bool> {
        let updated = {
            let result = get_connection(&self.pool).and_then(|conn| update_phone(&conn, handle, phone_number));
            match result {
                Ok(updated) => updated,
                Err(e) => {
                    log::error!("Failed to save phone for {}: {}", handle, e);
                    self.reply(handle, CONTACT_APOLOGY_TEXT, &ReplyKeyboard::None).await;
                    return Err(e);
                }
            }
        };

        if updated {
            log::info!("Phone number saved for {}", handle);
            self.reply(handle, PHONE_SAVED_TEXT, &ReplyKeyboard::Remove).await;
        } else {
            log::warn!("Contact from unregistered handle {}", handle);
            self.reply(handle, START_FIRST_TEXT, &ReplyKeyboard::None).await;
        }
        Ok(updated)
    }

    pub async fn handle_help(&self, handle: &str) {
        self.reply(handle, HELP_TEXT, &ReplyKeyboard::None).await;
    }

    /// Tells the user whether they will receive broadcasts. Returns that flag.
    pub async fn handle_status(&self, handle: &str) -> AppResult<bool> {
        let lookup = get_connection(&self.pool).and_then(|conn| get_recipient_by_handle(&conn, handle));
        match lookup {
            Ok(recipient) => {
                let active = recipient.is_some_and(|r| r.is_active);
                let text = if active { STATUS_ACTIVE_TEXT } else { STATUS_INACTIVE_TEXT };
                self.reply(handle, text, &ReplyKeyboard::None).await;
                Ok(active)
            }
            Err(e) => {
                log::error!("Failed to load status for {}: {}", handle, e);
                self.reply(handle, STATUS_APOLOGY_TEXT, &ReplyKeyboard::None).await;
                Err(e)
            }
        }
    }

    /// Deactivates the recipient. Returns false when the handle is unknown.
    pub async fn handle_unsubscribe(&self, handle: &str) -> AppResult<bool> {
        let result = get_connection(&self.pool).and_then(|conn| set_active_by_handle(&conn, handle, false));
        match result {
            Ok(true) => {
                log::info!("Recipient {} unsubscribed", handle);
                self.reply(handle, UNSUBSCRIBED_TEXT, &ReplyKeyboard::Remove).await;
                Ok(true)
            }
            Ok(false) => {
                self.reply(handle, NOT_REGISTERED_TEXT, &ReplyKeyboard::None).await;
                Ok(false)
            }
            Err(e) => {
                log::error!("Failed to unsubscribe {}: {}", handle, e);
                self.reply(handle, UNSUBSCRIBE_APOLOGY_TEXT, &ReplyKeyboard::None).await;
                Err(e)
            }
        }
    }

    async fn reply(&self, handle: &str, text: &str, keyboard: &ReplyKeyboard) {
        if let Err(e) = self.gateway.send_text(handle, text, keyboard).await {
            log::warn!("Reply to {} failed: {}", handle, e);
        }
    }
}
