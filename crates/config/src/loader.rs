use std::{
    fmt::Display,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use {secrecy::Secret, tracing::debug, url::Url};

use crate::{
    error::{Error, Result},
    keys,
    schema::{
        BrokerConfig, Config, DEFAULT_CONCURRENCY, DEFAULT_RATELIMIT,
        DEFAULT_SHUTDOWN_GRACE_SECS, TelegramConfig,
    },
};

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using a custom lookup function.
    ///
    /// Values are trimmed; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(Error::Missing { key });

        let outbox = required(keys::OUTBOX)?;
        let inbox = required(keys::INBOX)?;
        let broker = BrokerConfig {
            addr: required(keys::REDIS_ADDR)?,
            password: get(keys::REDIS_PASSWORD).map(Secret::new),
        };
        check_broker(&broker)?;
        let telegram = TelegramConfig {
            token: Secret::new(required(keys::TELEGRAM_BOT_TOKEN)?),
            api_endpoint: get(keys::TELEGRAM_API_ENDPOINT),
        };

        let concurrency = parse_or::<usize>(
            keys::CONCURRENCY,
            get(keys::CONCURRENCY),
            DEFAULT_CONCURRENCY,
        )?;
        let concurrency = NonZeroUsize::new(concurrency)
            .ok_or_else(|| Error::invalid(keys::CONCURRENCY, "0", "must be at least 1"))?;

        let ratelimit =
            parse_or::<u32>(keys::RATELIMIT, get(keys::RATELIMIT), DEFAULT_RATELIMIT)?;
        let ratelimit = NonZeroU32::new(ratelimit)
            .ok_or_else(|| Error::invalid(keys::RATELIMIT, "0", "must be at least 1"))?;

        let shutdown_grace = Duration::from_secs(parse_or::<u64>(
            keys::SHUTDOWN_GRACE_SECS,
            get(keys::SHUTDOWN_GRACE_SECS),
            DEFAULT_SHUTDOWN_GRACE_SECS,
        )?);

        let config = Self {
            outbox,
            inbox,
            broker,
            telegram,
            concurrency,
            ratelimit,
            shutdown_grace,
        };
        debug!(?config, "configuration loaded");
        Ok(config)
    }
}

/// A full `REDIS_ADDR` URL must parse, and `REDIS_PASSWORD` may only be set
/// when the URL can take it.
fn check_broker(broker: &BrokerConfig) -> Result<()> {
    if !broker.is_full_url() {
        return Ok(());
    }
    let url = Url::parse(&broker.addr)
        .map_err(|e| Error::invalid(keys::REDIS_ADDR, broker.addr.clone(), e))?;
    if broker.password.is_none() {
        return Ok(());
    }
    if url.password().is_some() {
        return Err(Error::invalid(
            keys::REDIS_PASSWORD,
            "[REDACTED]",
            "REDIS_ADDR already carries a password",
        ));
    }
    if matches!(url.host_str(), None | Some("")) {
        return Err(Error::invalid(
            keys::REDIS_PASSWORD,
            "[REDACTED]",
            "REDIS_ADDR has no host to attach a password to",
        ));
    }
    Ok(())
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|e: T::Err| Error::invalid(key, value.clone(), e)),
    }
}
