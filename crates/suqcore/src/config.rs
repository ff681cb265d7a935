use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token, read from BOT_TOKEN or TELOXIDE_TOKEN.
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path, read from DATABASE_PATH.
/// Default: suq.sqlite
pub static DATABASE_PATH: Lazy<String> = Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "suq.sqlite".to_string()));

/// Log file path, read from LOG_FILE_PATH.
/// Default: suq.log
pub static LOG_FILE_PATH: Lazy<String> = Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "suq.log".to_string()));

/// Support phone quoted in order-status notifications, read from
/// SUPPORT_PHONE. Templates fall back to a generic phrase when unset.
pub static SUPPORT_PHONE: Lazy<Option<String>> = Lazy::new(|| env::var("SUPPORT_PHONE").ok());

/// Override for the accepted phone-number pattern, read from PHONE_PATTERN.
/// Which numbers count as orderable is a deployment policy, not code.
pub static PHONE_PATTERN: Lazy<Option<String>> = Lazy::new(|| env::var("PHONE_PATTERN").ok());

/// Operator HTTP surface configuration
pub mod admin {
    use super::{env, Lazy};

    /// Port for the admin API, read from ADMIN_PORT.
    /// Default: 8080
    pub static PORT: Lazy<u16> = Lazy::new(|| {
        env::var("ADMIN_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080)
    });
}

/// Broadcast pacing configuration
pub mod broadcast {
    use super::{env, Duration, Lazy};

    /// Delay between recipients in a fan-out, read from BROADCAST_DELAY_MS.
    /// Keeps the serial loop under the transport's rate limits.
    /// Default: 200
    pub static DELAY_MS: Lazy<u64> = Lazy::new(|| {
        env::var("BROADCAST_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(200)
    });

    /// Inter-recipient delay duration
    pub fn delay() -> Duration {
        Duration::from_millis(*DELAY_MS)
    }
}

/// Session staleness configuration
pub mod session {
    /// An AwaitingPhone session older than this is treated as abandoned
    /// by phone/contact handlers. There is no background eviction; the
    /// check happens when the next event for that chat arrives.
    pub const STALE_AFTER_MINUTES: i64 = 30;

    /// Staleness window duration
    pub fn stale_after() -> chrono::Duration {
        chrono::Duration::minutes(STALE_AFTER_MINUTES)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for the bot's HTTP client (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
