//! castcore - broadcast ledger and delivery engine for the castbot Telegram bot
//!
//! This library holds everything that does not speak HTTP or the Telegram
//! wire protocol: configuration, the SQLite ledger, the messaging gateway
//! abstraction, recipient registration, the broadcast dispatcher and the
//! scheduled message sweep.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and status types
//! - `storage`: connection pool, migrations and per-table query functions
//! - `gateway`: the `MessagingGateway` trait and the disabled fallback
//! - `registration`: `/start`, contact sharing and self-service commands
//! - `dispatch`: sequential fan-out of a broadcast with delivery records
//! - `scheduler`: periodic promotion of due scheduled messages

pub mod core;
pub mod dispatch;
pub mod gateway;
pub mod registration;
pub mod scheduler;
pub mod storage;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use dispatch::{BroadcastDispatcher, DispatchOutcome};
pub use gateway::{BotInfo, DisabledGateway, GatewayError, MessagingGateway, ReplyKeyboard};
pub use registration::{RegistrationHandler, StartOutcome, WelcomeDelivery};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
