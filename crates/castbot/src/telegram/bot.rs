//! Bot initialization and command list
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Command registration in the Telegram UI

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use castcore::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "register for broadcasts")]
    Start,
    #[command(description = "show this help message")]
    Help,
    #[command(description = "check your registration status")]
    Status,
    #[command(description = "stop receiving broadcasts")]
    Unsubscribe,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - No token configured, invalid URL or HTTP client failure
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.trim();
    if token.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN is not set"));
    }

    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(token, client);

    // Check if local Bot API server is configured
    let bot = if let Some(bot_api_url) = config::BOT_API_URL.as_deref() {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

/// Path the webhook listener is mounted on, relative to the public base URL.
pub const WEBHOOK_PATH: &str = "/api/telegram/webhook";

/// Full webhook URL for a public base such as `https://bot.example.com`.
pub fn webhook_url(base: &str) -> anyhow::Result<url::Url> {
    let full = format!("{}{}", base.trim().trim_end_matches('/'), WEBHOOK_PATH);
    url::Url::parse(&full).map_err(|e| anyhow::anyhow!("Invalid WEBHOOK_URL {}: {}", base, e))
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}
