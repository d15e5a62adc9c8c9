//! Ledger: SQLite pool, migrations and one module of query functions per table

pub mod broadcasts;
pub mod db;
pub mod deliveries;
pub mod migrations;
pub mod recipients;
pub mod scheduled;
pub mod settings;
pub mod stats;

// Re-exports for convenience
pub use broadcasts::{Broadcast, NewBroadcast};
pub use db::{create_pool, get_connection, now, DbConnection, DbPool};
pub use deliveries::Delivery;
pub use recipients::{NewRecipient, Recipient, RecipientStats};
pub use scheduled::{NewScheduledMessage, ScheduledMessage, ScheduledUpdate};
pub use settings::{BotSetting, WelcomeSettings};
pub use stats::DashboardStats;
