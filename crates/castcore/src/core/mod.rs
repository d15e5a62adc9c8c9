//! Core utilities, configuration, errors and logging

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-exports for convenience
pub use error::{AppError, AppResult, FieldErrors, Validator};
pub use logging::{init_logger, install_panic_hook};
pub use types::{BroadcastStatus, DeliveryStatus, ScheduledStatus};
