//! Configuration module for the music bot.
//!
//! Handles loading and validation of the Discord token, Lavalink
//! connection settings and player timing from the environment.

mod settings;

pub use settings::{BotConfig, ConfigError, LavalinkConfig};

/// Seconds an idle player waits before leaving the voice channel.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 120;

/// Maximum number of queue entries shown by the `queue` command.
pub const QUEUE_DISPLAY_LIMIT: usize = 20;

/// Longest track title shown in a queue line, in characters.
pub const QUEUE_TITLE_LIMIT: usize = 90;

/// Discord's maximum message length, in characters.
pub const MESSAGE_LIMIT: usize = 2000;
