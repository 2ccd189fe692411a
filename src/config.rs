//! Environment configuration, validated at load and cached process-wide.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name} ({value}): {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: impl Display, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Immutable service configuration. Loaded once per process; the cache has a
/// reset hook so tests can re-read the environment.
#[derive(Clone, Debug)]
pub struct InterceptorConfig {
    /// Risk score at and above which a message is blocked synchronously.
    pub sync_threshold: f64,
    pub max_message_length: usize,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_reset_ms: u64,
    pub circuit_breaker_half_open_max: u32,
    pub redis_host: String,
    pub redis_port: u16,
    pub message_stream_key: String,
    pub detection_host: String,
    pub detection_port: u16,
    pub ws_port: u16,
    pub health_port: u16,
}

static CACHE: Lazy<RwLock<Option<Arc<InterceptorConfig>>>> = Lazy::new(|| RwLock::new(None));

impl InterceptorConfig {
    /// Load from the environment, or return the cached copy.
    pub fn get() -> Result<Arc<Self>, ConfigError> {
        if let Some(config) = CACHE.read().as_ref() {
            return Ok(Arc::clone(config));
        }
        let config = Arc::new(Self::from_env()?);
        *CACHE.write() = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Drop the cached configuration so the next `get` re-reads the
    /// environment.
    pub fn reset() {
        *CACHE.write() = None;
    }

    fn from_env() -> Result<Self, ConfigError> {
        let sync_threshold: f64 = env_parsed("SYNC_THRESHOLD", 0.65)?;
        if !(0.0..=1.0).contains(&sync_threshold) {
            return Err(ConfigError::invalid(
                "SYNC_THRESHOLD",
                sync_threshold,
                "must be within [0, 1]",
            ));
        }

        let max_message_length: usize = env_parsed("MAX_MESSAGE_LENGTH", 10_000)?;
        if max_message_length == 0 {
            return Err(ConfigError::invalid(
                "MAX_MESSAGE_LENGTH",
                max_message_length,
                "must be at least 1",
            ));
        }

        let circuit_breaker_threshold: u32 = env_parsed("CIRCUIT_BREAKER_THRESHOLD", 5)?;
        if circuit_breaker_threshold == 0 {
            return Err(ConfigError::invalid(
                "CIRCUIT_BREAKER_THRESHOLD",
                circuit_breaker_threshold,
                "must be at least 1",
            ));
        }

        let circuit_breaker_reset_ms: u64 = env_parsed("CIRCUIT_BREAKER_RESET_MS", 30_000)?;
        if circuit_breaker_reset_ms < 1_000 {
            return Err(ConfigError::invalid(
                "CIRCUIT_BREAKER_RESET_MS",
                circuit_breaker_reset_ms,
                "must be at least 1000",
            ));
        }

        let circuit_breaker_half_open_max: u32 = env_parsed("CIRCUIT_BREAKER_HALF_OPEN_MAX", 1)?;
        if !(1..=3).contains(&circuit_breaker_half_open_max) {
            return Err(ConfigError::invalid(
                "CIRCUIT_BREAKER_HALF_OPEN_MAX",
                circuit_breaker_half_open_max,
                "must be within 1..=3",
            ));
        }

        let message_stream_key = env_string("REDIS_STREAM_MESSAGES", "cis:messages");
        if message_stream_key.is_empty() {
            return Err(ConfigError::invalid(
                "REDIS_STREAM_MESSAGES",
                "",
                "must not be empty",
            ));
        }

        Ok(Self {
            sync_threshold,
            max_message_length,
            circuit_breaker_threshold,
            circuit_breaker_reset_ms,
            circuit_breaker_half_open_max,
            redis_host: env_string("REDIS_HOST", "localhost"),
            redis_port: env_port("REDIS_PORT", 6379)?,
            message_stream_key,
            detection_host: env_string("DETECTION_HOST", "localhost"),
            detection_port: env_port("DETECTION_PORT", 8001)?,
            ws_port: env_port("WS_PORT", 8080)?,
            health_port: env_port("HEALTH_PORT", 8081)?,
        })
    }
}

fn env_string(name: &'static str, default: &str) -> String {
    std::env::var(name)
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err: T::Err| ConfigError::invalid(name, raw.trim(), err.to_string())),
        Err(_) => Ok(default),
    }
}

fn env_port(name: &'static str, default: u16) -> Result<u16, ConfigError> {
    let port: u16 = env_parsed(name, default)?;
    if port == 0 {
        return Err(ConfigError::invalid(name, port, "must be a non-zero port"));
    }
    Ok(port)
}
