use std::str::FromStr;
use std::time::Duration;

use sitecheck_core::upload_queue::RetryPolicy;
use sitecheck_engine::upload_replay::{DEFAULT_BATCH_SIZE, DEFAULT_LOCK_TIMEOUT};

/// A configuration variable that is missing or cannot be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

fn env_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Time between replay cycles.
    pub interval: Duration,
    /// Items claimed per cycle.
    pub batch_size: i64,
    /// Items stuck in `processing` longer than this are released.
    pub stale_after: Duration,
    /// Longest wait for a row lock during one replay.
    pub lock_timeout: Duration,
    pub retry: RetryPolicy,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `DATABASE_URL`                 | required|
    /// | `UPLOAD_REPLAY_INTERVAL_SECS`  | `5`     |
    /// | `UPLOAD_REPLAY_BATCH_SIZE`     | `20`    |
    /// | `UPLOAD_STALE_AFTER_SECS`      | `300`   |
    /// | `UPLOAD_LOCK_TIMEOUT_MS`       | `5000`  |
    /// | `UPLOAD_MAX_ATTEMPTS`          | `5`     |
    /// | `UPLOAD_RETRY_BASE_SECS`       | `30`    |
    /// | `UPLOAD_RETRY_MAX_SECS`        | `3600`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let defaults = RetryPolicy::default();

        let interval_secs: u64 = env_or("UPLOAD_REPLAY_INTERVAL_SECS", 5)?;
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "UPLOAD_REPLAY_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            database_url,
            interval: Duration::from_secs(interval_secs),
            batch_size: env_or("UPLOAD_REPLAY_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            stale_after: Duration::from_secs(env_or("UPLOAD_STALE_AFTER_SECS", 300)?),
            lock_timeout: Duration::from_millis(env_or(
                "UPLOAD_LOCK_TIMEOUT_MS",
                DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
            )?),
            retry: RetryPolicy {
                max_attempts: env_or("UPLOAD_MAX_ATTEMPTS", defaults.max_attempts)?,
                base_delay: Duration::from_secs(env_or(
                    "UPLOAD_RETRY_BASE_SECS",
                    defaults.base_delay.as_secs(),
                )?),
                max_delay: Duration::from_secs(env_or(
                    "UPLOAD_RETRY_MAX_SECS",
                    defaults.max_delay.as_secs(),
                )?),
            },
        })
    }
}
