//! Client configuration parsed from environment variables.

use std::time::Duration;

use crate::heartbeat::DEFAULT_HEARTBEAT_INTERVAL;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::typing::{DEFAULT_TYPING_IDLE, TypingEmission};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(3_000);

/// Fixed endpoint path on the chat server.
pub const CHAT_PATH: &str = "/chat";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported CHAT_TYPING_EMISSION '{0}' (expected 'edge' or 'every_keystroke')")]
    TypingEmission(String),
}

/// Timings and limits consumed by a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub heartbeat_interval: Duration,
    pub typing_idle: Duration,
    pub typing_emission: TypingEmission,
    pub restart_delay: Duration,
    pub history_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            typing_idle: DEFAULT_TYPING_IDLE,
            typing_emission: TypingEmission::Edge,
            restart_delay: DEFAULT_RESTART_DELAY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP(S) or WS(S) base URL of the chat server.
    pub base_url: String,
    /// Display name used instead of prompting, when set.
    pub name: Option<String>,
    pub session: SessionSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            name: None,
            session: SessionSettings::default(),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `CHAT_BASE_URL`: default `http://127.0.0.1:3000`
    /// - `CHAT_NAME`: prompt when absent
    /// - `CHAT_HEARTBEAT_MS`: default 20000
    /// - `CHAT_TYPING_IDLE_MS`: default 2000
    /// - `CHAT_TYPING_EMISSION`: `edge` (default) or `every_keystroke`
    /// - `CHAT_RESTART_DELAY_MS`: default 3000
    /// - `CHAT_HISTORY_CAPACITY`: default 50
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unknown typing emission mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = SessionSettings::default();
        let base_url = std::env::var("CHAT_BASE_URL")
            .map_or_else(|_| DEFAULT_BASE_URL.to_owned(), |v| v.trim_end_matches('/').to_owned());
        let name = std::env::var("CHAT_NAME").ok().filter(|s| !s.trim().is_empty());
        let typing_emission = parse_typing_emission(std::env::var("CHAT_TYPING_EMISSION").ok().as_deref())?;

        let session = SessionSettings {
            heartbeat_interval: env_millis("CHAT_HEARTBEAT_MS", defaults.heartbeat_interval),
            typing_idle: env_millis("CHAT_TYPING_IDLE_MS", defaults.typing_idle),
            typing_emission,
            restart_delay: env_millis("CHAT_RESTART_DELAY_MS", defaults.restart_delay),
            history_capacity: env_parse("CHAT_HISTORY_CAPACITY", defaults.history_capacity),
        };

        Ok(Self { base_url, name, session })
    }
}

pub(crate) fn parse_typing_emission(raw: Option<&str>) -> Result<TypingEmission, ConfigError> {
    match raw.map(str::trim).unwrap_or("edge") {
        "edge" | "" => Ok(TypingEmission::Edge),
        "every_keystroke" => Ok(TypingEmission::EveryKeystroke),
        other => Err(ConfigError::TypingEmission(other.to_owned())),
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(env_parse(key, default_ms))
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key).map_or(default, |v| v.trim().parse::<T>().unwrap_or(default))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
