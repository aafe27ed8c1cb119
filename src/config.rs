//! Runtime configuration, read from the environment (and `.env`).

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the chat service.
    pub api_url: String,
    /// Identity sent with every chat turn.
    pub user_id: String,
    /// Per-request timeout; unset means none.
    pub request_timeout: Option<Duration>,
    /// Surface failures as assistant messages too.
    pub echo_errors_inline: bool,
    /// Listen address of the reference chat service.
    pub bind_addr: String,
    pub rate_limit_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            user_id: "test-user-123".to_string(),
            request_timeout: None,
            echo_errors_inline: false,
            bind_addr: "0.0.0.0:8000".to_string(),
            rate_limit_per_minute: 60,
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let request_timeout = match get("CHAT_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse("CHAT_REQUEST_TIMEOUT_SECS", &raw)?)),
            None => None,
        };
        let echo_errors_inline = match get("CHAT_ECHO_ERRORS") {
            Some(raw) => parse_bool("CHAT_ECHO_ERRORS", &raw)?,
            None => defaults.echo_errors_inline,
        };
        let rate_limit_per_minute = match get("CHAT_RATE_LIMIT_PER_MINUTE") {
            Some(raw) => parse("CHAT_RATE_LIMIT_PER_MINUTE", &raw)?,
            None => defaults.rate_limit_per_minute,
        };

        Ok(Self {
            api_url: get("CHAT_API_URL").unwrap_or(defaults.api_url),
            user_id: get("CHAT_USER_ID").unwrap_or(defaults.user_id),
            request_timeout,
            echo_errors_inline,
            bind_addr: get("CHAT_BIND_ADDR").unwrap_or(defaults.bind_addr),
            rate_limit_per_minute,
        })
    }
}

fn parse<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
