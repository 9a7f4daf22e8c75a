//! Shared constants for Warden components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default HTTP listen address (health + admin)
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8899";

/// Default captcha timeout in seconds (5 minutes)
pub const DEFAULT_CAPTCHA_TIMEOUT_SECS: u32 = 300;

/// Smallest captcha timeout an admin may configure
pub const MIN_CAPTCHA_TIMEOUT_SECS: u32 = 60;

/// Largest captcha timeout an admin may configure (1 hour)
pub const MAX_CAPTCHA_TIMEOUT_SECS: u32 = 3600;

/// Default per-user message cooldown (disabled)
pub const DEFAULT_MESSAGE_COOLDOWN_SECS: u32 = 0;

/// Largest message cooldown an admin may configure (1 day)
pub const MAX_MESSAGE_COOLDOWN_SECS: u32 = 86_400;

/// Challenges issued per cycle before the user is out of attempts
pub const MAX_CAPTCHA_ATTEMPTS: u32 = 3;

/// Ban length for an unsolved captcha (24 hours)
pub const CAPTCHA_BAN_HOURS: i64 = 24;

/// How long transient notices stay visible before the bot retracts them
pub const NOTICE_DISPLAY_SECS: u64 = 10;

/// Pause before a new challenge follows a wrong answer
pub const CAPTCHA_REISSUE_DELAY_MS: u64 = 500;

/// Restriction-lift attempts before falling back to unban
pub const LIFT_RETRY_ATTEMPTS: u32 = 3;

/// Fixed backoff between restriction-lift attempts
pub const LIFT_RETRY_BACKOFF_SECS: u64 = 2;

/// Delay between consecutive broadcast sends
pub const BROADCAST_PACING_MS: u64 = 1000;

/// Shortest autoposting interval (1/60 hour)
pub const MIN_AUTOPOST_INTERVAL_MINUTES: u64 = 1;

/// Longest autoposting interval (one year)
pub const MAX_AUTOPOST_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

/// Telegram caps callback data at this many bytes
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

/// Redis key prefixes
pub mod redis_keys {
    /// Chat settings: warden:chat:{chat_id}
    pub const CHAT_PREFIX: &str = "warden:chat:";

    /// Set of registered chat ids
    pub const CHAT_INDEX: &str = "warden:chats";

    /// Captcha status: warden:captcha:{chat_id}:{user_id}
    pub const CAPTCHA_PREFIX: &str = "warden:captcha:";

    /// Last accepted message: warden:lastmsg:{chat_id}:{user_id}
    pub const LAST_MESSAGE_PREFIX: &str = "warden:lastmsg:";

    /// Set of "{chat_id}:{message_id}" pinned by broadcasts
    pub const PINNED: &str = "warden:pinned";

    /// Global stop-word set
    pub const STOP_WORDS: &str = "warden:stopwords";
}
