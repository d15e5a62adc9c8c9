//! Configuration for the bot and dashboard.
//!
//! Every value is read once from the environment on first access. Call
//! [`validate_required`] at startup so a missing required variable is fatal
//! before anything else touches the statics.

use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// SQLite database file path
/// Read from DATABASE_PATH environment variable (required, no default)
pub static DATABASE_PATH: Lazy<Option<String>> = Lazy::new(|| non_empty_var("DATABASE_PATH"));

/// Bearer token protecting the dashboard API
/// Read from DASHBOARD_TOKEN environment variable (required, no default)
pub static DASHBOARD_TOKEN: Lazy<Option<String>> = Lazy::new(|| non_empty_var("DASHBOARD_TOKEN"));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable.
/// Empty means the bot runs in degraded mode (every send fails per recipient).
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Custom Bot API server URL (local telegram-bot-api)
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| non_empty_var("BOT_API_URL"));

/// Public base URL Telegram should push updates to in webhook mode
/// Read from WEBHOOK_URL environment variable
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| non_empty_var("WEBHOOK_URL"));

/// Log file path
/// Default: castbot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "castbot.log".to_string()));

/// Dashboard HTTP port
/// Default: 3000
pub static WEB_PORT: Lazy<u16> = Lazy::new(|| parse_var("WEB_PORT", 3000));

/// Broadcast dispatch configuration
pub mod dispatch {
    use super::{parse_var, Duration, Lazy};

    /// Fixed delay between two recipients of one broadcast (milliseconds).
    /// Crude guard against Telegram flood limits, not adaptive.
    pub static DELAY_MS: Lazy<u64> = Lazy::new(|| parse_var("DISPATCH_DELAY_MS", 50));

    /// When true, at most one broadcast sends at a time.
    pub static SERIALIZE: Lazy<bool> = Lazy::new(|| parse_var("DISPATCH_SERIALIZE", false));

    /// Inter-recipient delay duration
    pub fn delay() -> Duration {
        Duration::from_millis(*DELAY_MS)
    }
}

/// Scheduled message sweep configuration
pub mod scheduler {
    use super::{parse_var, Duration, Lazy};

    /// Interval between two sweeps (seconds)
    pub static INTERVAL_SECS: Lazy<u64> = Lazy::new(|| parse_var("SCHEDULER_INTERVAL_SECS", 30));

    /// Sweep interval duration
    pub fn interval() -> Duration {
        Duration::from_secs((*INTERVAL_SECS).max(1))
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Database configuration
pub mod database {
    use super::Duration;

    /// Maximum number of pooled SQLite connections
    pub const MAX_POOL_SIZE: u32 = 10;

    /// How long a writer waits on a locked database (in seconds)
    pub const BUSY_TIMEOUT_SECS: u64 = 5;

    /// Busy timeout duration
    pub fn busy_timeout() -> Duration {
        Duration::from_secs(BUSY_TIMEOUT_SECS)
    }
}

/// Broadcast content limits
pub mod limits {
    /// Telegram's maximum text message length
    pub const MAX_MESSAGE_CHARS: usize = 4096;

    /// Broadcast / scheduled message title length
    pub const MAX_TITLE_CHARS: usize = 256;

    /// Telegram's maximum photo caption length
    pub const MAX_CAPTION_CHARS: usize = 1024;

    /// Reply keyboard button label length
    pub const MAX_BUTTON_CHARS: usize = 64;

    /// Upper bound for `GET /api/broadcasts?limit=`
    pub const MAX_LIST_LIMIT: u32 = 500;
}

/// Names of required variables that are missing.
pub fn missing_required() -> Vec<&'static str> {
    let mut missing = Vec::new();
    if DATABASE_PATH.is_none() {
        missing.push("DATABASE_PATH");
    }
    if DASHBOARD_TOKEN.is_none() {
        missing.push("DASHBOARD_TOKEN");
    }
    missing
}

/// Fails when a required variable is absent.
pub fn validate_required() -> anyhow::Result<()> {
    let missing = missing_required();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Missing required environment variable(s): {}",
            missing.join(", ")
        ))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring invalid {}={:?}, using default", name, raw);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var_falls_back_on_garbage() {
        std::env::set_var("CASTBOT_TEST_PARSE_VAR", "not-a-number");
        assert_eq!(parse_var("CASTBOT_TEST_PARSE_VAR", 42u64), 42);

        std::env::set_var("CASTBOT_TEST_PARSE_VAR", " 7 ");
        assert_eq!(parse_var("CASTBOT_TEST_PARSE_VAR", 42u64), 7);
        std::env::remove_var("CASTBOT_TEST_PARSE_VAR");
    }

    #[test]
    fn test_non_empty_var_treats_blank_as_missing() {
        std::env::set_var("CASTBOT_TEST_BLANK_VAR", "   ");
        assert_eq!(non_empty_var("CASTBOT_TEST_BLANK_VAR"), None);
        std::env::remove_var("CASTBOT_TEST_BLANK_VAR");
    }
}
