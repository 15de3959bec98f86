//! Player manager.
//!
//! Owns the per-guild state and reacts to the events that move a guild
//! between playing, queued and idle:
//! - track end → play the next queued track, or start the idle timer
//! - idle timer → leave voice if still nothing is playing
//! - listeners leaving → clear everything and leave immediately

use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::{ChannelId, GuildId};
use tracing::{debug, info, warn};

use super::state::{GuildMusicState, GuildStates, SharedGuildState};
use super::{AudioBackend, PlayerError, Playable};

/// Prefixes that mark a query as a direct link.
const URL_PREFIXES: [&str; 2] = ["http://", "https://"];

/// A voice state change reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceChange {
    /// Whether the member is a bot account.
    pub is_bot: bool,

    /// Channel the member was in before the change.
    pub before: Option<ChannelId>,

    /// Channel the member is in after the change.
    pub after: Option<ChannelId>,
}

/// Coordinates the audio backend with the per-guild queues.
pub struct PlayerManager<B: AudioBackend> {
    backend: Arc<B>,
    states: GuildStates<B::Track>,
    idle_timeout: Duration,
}

impl<B: AudioBackend> PlayerManager<B> {
    /// Creates a new player manager.
    #[must_use]
    pub fn new(backend: Arc<B>, idle_timeout: Duration) -> Self {
        Self {
            backend,
            states: GuildStates::new(),
            idle_timeout,
        }
    }

    /// The audio backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Seconds-resolution idle timeout.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Returns the state of a guild, creating it if needed.
    pub async fn state(&self, guild_id: GuildId) -> SharedGuildState<B::Track> {
        self.states.get(guild_id).await
    }

    /// Makes sure the bot sits in the invoking user's voice channel.
    ///
    /// # Errors
    ///
    /// Fails if the invoker is not a guild member, is not in voice, or the
    /// backend cannot join.
    pub async fn ensure_connected(
        &self,
        guild_id: GuildId,
        is_member: bool,
        user_channel: Option<ChannelId>,
    ) -> Result<(), PlayerError> {
        if !is_member {
            return Err(PlayerError::MemberUnavailable);
        }
        let channel_id = user_channel.ok_or(PlayerError::NotInVoice)?;

        match self.backend.connected_channel(guild_id).await {
            Some(current) if current == channel_id => Ok(()),
            Some(current) => {
                info!("Moving from channel {} to {} in guild {}", current, channel_id, guild_id);
                self.backend.join(guild_id, channel_id).await?;
                Ok(())
            }
            None => {
                info!("Joining channel {} in guild {}", channel_id, guild_id);
                self.backend.join(guild_id, channel_id).await?;
                Ok(())
            }
        }
    }

    /// Resolves a user query to a single track.
    ///
    /// Links are loaded as-is; anything else is searched on YouTube.
    ///
    /// # Errors
    ///
    /// Returns [`PlayerError::TrackNotFound`] if nothing matched.
    pub async fn resolve_track(&self, query: &str) -> Result<B::Track, PlayerError> {
        let identifier = search_identifier(query);
        debug!("Resolving track for identifier: {}", identifier);

        self.backend
            .search(&identifier)
            .await?
            .into_iter()
            .next()
            .ok_or(PlayerError::TrackNotFound)
    }

    /// Starts the idle timer, replacing any pending one.
    ///
    /// When it fires, the bot leaves voice unless something is playing or
    /// queued by then.
    pub fn schedule_idle_disconnect(
        &self,
        guild_id: GuildId,
        shared: &SharedGuildState<B::Track>,
        state: &mut GuildMusicState<B::Track>,
    ) {
        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(shared);
        let timeout = self.idle_timeout;

        debug!("Scheduling idle disconnect in {:?} for guild {}", timeout, guild_id);

        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let state = shared.lock().await;
            if !backend.is_playing(guild_id).await && state.queue.is_empty() {
                info!("Idle timeout reached, leaving voice in guild {}", guild_id);
                if let Err(e) = backend.disconnect(guild_id).await {
                    warn!("Failed to disconnect idle player in guild {}: {}", guild_id, e);
                }
            }
        });

        state.set_idle_task(task);
    }

    /// Handles the end of a track: play the next one or go idle.
    pub async fn on_track_end(&self, guild_id: GuildId) {
        if self.backend.connected_channel(guild_id).await.is_none() {
            debug!("Track ended in guild {} without a voice connection", guild_id);
            return;
        }

        let shared = self.states.get(guild_id).await;
        let mut state = shared.lock().await;

        while let Some(next) = state.queue.pop_front() {
            match self.backend.play(guild_id, &next).await {
                Ok(()) => {
                    info!(
                        "Playing next track in guild {}: \"{}\" ({} left in queue)",
                        guild_id,
                        next.title(),
                        state.queue.len()
                    );
                    return;
                }
                Err(e) => warn!("Failed to play \"{}\" in guild {}: {}", next.title(), guild_id, e),
            }
        }

        self.schedule_idle_disconnect(guild_id, &shared, &mut state);
    }

    /// Handles a member's voice state change.
    ///
    /// Leaves immediately once no human listener remains in the bot's
    /// channel. `count_humans` counts non-bot members in a channel.
    /// Returns `true` if the bot left.
    pub async fn on_voice_state_update<F>(
        &self,
        guild_id: GuildId,
        change: VoiceChange,
        count_humans: F,
    ) -> bool
    where
        F: FnOnce(ChannelId) -> usize + Send,
    {
        if change.is_bot {
            return false;
        }

        let Some(bot_channel) = self.backend.connected_channel(guild_id).await else {
            return false;
        };

        if change.before != Some(bot_channel) && change.after != Some(bot_channel) {
            return false;
        }

        let humans_left = count_humans(bot_channel);
        if humans_left > 0 {
            return false;
        }

        info!("No listeners left in channel {} of guild {}, leaving", bot_channel, guild_id);

        let shared = self.states.get(guild_id).await;
        let mut state = shared.lock().await;
        state.queue.clear();
        state.cancel_idle();

        if self.backend.is_playing(guild_id).await
            && let Err(e) = self.backend.stop(guild_id).await
        {
            warn!("Failed to stop playback in guild {}: {}", guild_id, e);
        }
        if let Err(e) = self.backend.disconnect(guild_id).await {
            warn!("Failed to disconnect in guild {}: {}", guild_id, e);
        }

        true
    }

    /// Handles the bot being removed from voice by someone else.
    pub async fn on_bot_disconnected(&self, guild_id: GuildId) {
        if self.backend.connected_channel(guild_id).await.is_none() {
            return;
        }

        info!("Disconnected from voice externally in guild {}", guild_id);

        let shared = self.states.get(guild_id).await;
        let mut state = shared.lock().await;
        state.queue.clear();
        state.cancel_idle();

        if let Err(e) = self.backend.disconnect(guild_id).await {
            warn!("Failed to release player in guild {}: {}", guild_id, e);
        }
    }
}

impl<B: AudioBackend> std::fmt::Debug for PlayerManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerManager")
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

/// Turns a user query into a backend identifier.
fn search_identifier(query: &str) -> String {
    if URL_PREFIXES.iter().any(|prefix| query.starts_with(prefix)) {
        query.to_owned()
    } else {
        format!("ytsearch:{query}")
    }
}
