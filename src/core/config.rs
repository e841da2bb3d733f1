use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot
/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Public base URL for Telegram webhook delivery
/// Read from WEBHOOK_URL environment variable, e.g. https://bot.example.com
/// The webhook endpoint path (/api/webhook) is appended automatically
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| env::var("WEBHOOK_URL").ok());

/// Secret token for webhook request authentication
/// Read from WEBHOOK_SECRET_TOKEN environment variable
/// When set, incoming webhook requests must carry the matching
/// X-Telegram-Bot-Api-Secret-Token header; mismatches are acknowledged
/// but dropped
pub static WEBHOOK_SECRET_TOKEN: Lazy<Option<String>> = Lazy::new(|| env::var("WEBHOOK_SECRET_TOKEN").ok());

/// Local port the webhook HTTP server binds to
/// Read from WEBHOOK_PORT environment variable
/// Default: 8080
pub static WEBHOOK_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBHOOK_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080)
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: knopka.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "knopka.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Session lifecycle configuration
pub mod session {
    use super::Duration;

    /// Default time-to-live for a conversational session (in seconds)
    pub const DEFAULT_TTL_SECS: u64 = 2 * 60 * 60; // 2 hours

    /// Interval between expired-session sweeps (in seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 600; // 10 minutes

    /// Default session TTL duration
    pub fn default_ttl() -> Duration {
        Duration::from_secs(DEFAULT_TTL_SECS)
    }

    /// Sweep interval duration
    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Channel claim configuration
pub mod claim {
    /// How long a self-registered channel stays claimable (in hours)
    pub const CLAIM_WINDOW_HOURS: i64 = 24;
}

/// Validation configuration
pub mod validation {
    /// Maximum post text length (Telegram message limit)
    pub const MAX_POST_TEXT_LEN: usize = 4096;

    /// Maximum button label length (Telegram inline button limit)
    pub const MAX_BUTTON_LABEL_LEN: usize = 64;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Telegram API calls (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
