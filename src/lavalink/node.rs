//! State shared between the node socket and the backend.

use std::collections::HashMap;

use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::RwLock;

use super::model::{Track, VoiceServer};

/// What the bot knows about one guild's player.
#[derive(Debug, Clone)]
pub struct PlayerSlot {
    /// Voice channel the bot joined.
    pub channel_id: ChannelId,

    /// Voice server details last received from Discord.
    pub voice: VoiceServer,

    /// Session the voice details were last sent to.
    pub synced_session: Option<String>,

    /// Track currently playing.
    pub current: Option<Track>,
}

/// Session id and players of the connected node.
#[derive(Debug, Default)]
pub struct NodeState {
    session_id: RwLock<Option<String>>,
    players: RwLock<HashMap<GuildId, PlayerSlot>>,
}

impl NodeState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session id of the live WebSocket, if any.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Records a new session, or clears it when the socket drops.
    pub async fn set_session(&self, session_id: Option<String>) {
        *self.session_id.write().await = session_id;
    }

    /// Snapshot of a guild's player.
    pub async fn player(&self, guild_id: GuildId) -> Option<PlayerSlot> {
        self.players.read().await.get(&guild_id).cloned()
    }

    /// Stores a guild's player after joining voice.
    pub async fn insert_player(&self, guild_id: GuildId, slot: PlayerSlot) {
        self.players.write().await.insert(guild_id, slot);
    }

    /// Applies a change to a guild's player, if it exists.
    pub async fn update_player<F>(&self, guild_id: GuildId, update: F) -> bool
    where
        F: FnOnce(&mut PlayerSlot),
    {
        match self.players.write().await.get_mut(&guild_id) {
            Some(slot) => {
                update(slot);
                true
            }
            None => false,
        }
    }

    /// Clears the current track if it is the one that ended.
    ///
    /// Returns `false` when another track is playing, i.e. the end is stale.
    pub async fn end_track(&self, guild_id: GuildId, encoded: &str) -> bool {
        let mut players = self.players.write().await;
        let Some(slot) = players.get_mut(&guild_id) else {
            return true;
        };

        match &slot.current {
            Some(current) if current.encoded != encoded => false,
            _ => {
                slot.current = None;
                true
            }
        }
    }

    /// Forgets a guild's player.
    pub async fn remove_player(&self, guild_id: GuildId) -> Option<PlayerSlot> {
        self.players.write().await.remove(&guild_id)
    }

    /// Marks every player as idle, e.g. after the node lost its session.
    pub async fn clear_all_tracks(&self) -> Vec<GuildId> {
        let mut players = self.players.write().await;
        players
            .iter_mut()
            .filter_map(|(guild_id, slot)| slot.current.take().map(|_| *guild_id))
            .collect()
    }
}
