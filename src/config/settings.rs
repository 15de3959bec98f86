//! Bot settings and Lavalink connection configuration.

use std::fmt;
use std::time::Duration;

use super::DEFAULT_IDLE_TIMEOUT_SECS;

/// Lavalink node connection settings.
#[derive(Clone)]
pub struct LavalinkConfig {
    /// Host name of the Lavalink node.
    pub host: String,

    /// Port the Lavalink node listens on.
    pub port: u16,

    /// Password sent in the `Authorization` header.
    pub password: String,
}

impl LavalinkConfig {
    /// Base URL for REST requests, e.g. `http://lavalink:2333`.
    #[must_use]
    pub fn rest_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// URL of the v4 WebSocket endpoint.
    #[must_use]
    pub fn websocket_url(&self) -> String {
        format!("ws://{}:{}/v4/websocket", self.host, self.port)
    }
}

impl fmt::Debug for LavalinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LavalinkConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Top-level bot configuration.
#[derive(Clone)]
pub struct BotConfig {
    /// Discord bot token.
    pub discord_token: String,

    /// Lavalink node settings.
    pub lavalink: LavalinkConfig,

    /// Seconds an idle player stays in voice before leaving.
    pub idle_timeout_secs: u64,
}

impl BotConfig {
    /// Creates configuration from environment variables.
    ///
    /// Expects `DISCORD_TOKEN`, `LAVALINK_HOST`, `LAVALINK_PORT` and
    /// `LAVALINK_PASSWORD` to be set.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a number is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a number is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::MissingEnvVar(name));

        let discord_token = required("DISCORD_TOKEN")?;
        let host = required("LAVALINK_HOST")?;
        let port = parse_number("LAVALINK_PORT", &required("LAVALINK_PORT")?)?;
        let password = required("LAVALINK_PASSWORD")?;

        let idle_timeout_secs = match lookup("IDLE_TIMEOUT_SEC") {
            Some(value) => parse_number("IDLE_TIMEOUT_SEC", &value)?,
            None => DEFAULT_IDLE_TIMEOUT_SECS,
        };

        Ok(Self {
            discord_token,
            lavalink: LavalinkConfig {
                host,
                port,
                password,
            },
            idle_timeout_secs,
        })
    }

    /// Idle timeout as a [`Duration`].
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &"<redacted>")
            .field("lavalink", &self.lavalink)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .finish()
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_owned(),
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid value for {var}: '{value}' (must be a non-negative integer)")]
    InvalidNumber { var: &'static str, value: String },
}
