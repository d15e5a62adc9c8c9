//! castbot - Telegram broadcast bot with an admin dashboard API
//!
//! The binary wires the `castcore` ledger and dispatcher to two surfaces:
//! the Telegram bot (teloxide) and the dashboard REST API (axum).
//!
//! # Module Structure
//!
//! - `api`: dashboard routes, bearer-token auth and error responses
//! - `telegram`: bot creation, the teloxide gateway and update handlers
//! - `cli`: command-line arguments

pub mod api;
pub mod cli;
pub mod telegram;

// Re-export commonly used types for convenience
pub use api::{router, AppState};
pub use telegram::{create_bot, schema, HandlerDeps, TelegramGateway};
