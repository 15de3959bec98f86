//! Audio backend abstraction.
//!
//! The player logic only needs a handful of operations from the audio
//! node: searching, joining voice, starting and stopping a track. The
//! Lavalink implementation lives in [`crate::lavalink`].

use std::future::Future;

use serenity::model::id::{ChannelId, GuildId};
use thiserror::Error;

/// Errors reported by an audio backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Audio node is not ready yet")]
    NotReady,

    #[error("Failed to load tracks: {0}")]
    LoadFailed(String),

    #[error("Voice connection failed: {0}")]
    Voice(String),

    #[error("Audio node request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Audio node returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// A track that can be queued and announced.
pub trait Playable: Clone + Send + Sync + 'static {
    /// Human-readable track title.
    fn title(&self) -> &str;
}

/// Operations the player needs from the audio node.
pub trait AudioBackend: Send + Sync + 'static {
    /// Track type produced by searches and accepted by [`Self::play`].
    type Track: Playable;

    /// Loads tracks for an identifier (URL or `ytsearch:` query).
    fn search(
        &self,
        identifier: &str,
    ) -> impl Future<Output = Result<Vec<Self::Track>, BackendError>> + Send;

    /// Voice channel the bot is connected to in this guild, if any.
    fn connected_channel(&self, guild_id: GuildId) -> impl Future<Output = Option<ChannelId>> + Send;

    /// Connects to a voice channel, or moves there if already connected elsewhere.
    fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Whether a track is currently playing in this guild.
    fn is_playing(&self, guild_id: GuildId) -> impl Future<Output = bool> + Send;

    /// Starts playing a track, replacing whatever is playing.
    fn play(
        &self,
        guild_id: GuildId,
        track: &Self::Track,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Stops the current track. The node reports a track end afterwards.
    fn stop(&self, guild_id: GuildId) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Destroys the player and leaves the voice channel.
    fn disconnect(&self, guild_id: GuildId) -> impl Future<Output = Result<(), BackendError>> + Send;
}
