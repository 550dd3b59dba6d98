//! Recognised environment variable names.

pub const OUTBOX: &str = "OUTBOX";
pub const INBOX: &str = "INBOX";
pub const REDIS_ADDR: &str = "REDIS_ADDR";
pub const REDIS_PASSWORD: &str = "REDIS_PASSWORD";
pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_API_ENDPOINT: &str = "TELEGRAM_API_ENDPOINT";
pub const CONCURRENCY: &str = "CONCURRENCY";
pub const RATELIMIT: &str = "RATELIMIT";
pub const SHUTDOWN_GRACE_SECS: &str = "SHUTDOWN_GRACE_SECS";
