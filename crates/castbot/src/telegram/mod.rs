//! Telegram integration: bot creation, gateway and update handlers

pub mod bot;
pub mod gateway;
pub mod handlers;

pub use bot::{create_bot, setup_bot_commands, webhook_url, Command, WEBHOOK_PATH};
pub use gateway::TelegramGateway;
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use teloxide::Bot;
