//! [`AudioBackend`] implementation backed by a Lavalink node.

use std::sync::Arc;

use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::Songbird;
use songbird::error::JoinError;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::model::{Track, UpdatePlayer, VoiceServer};
use super::node::{NodeState, PlayerSlot};
use super::rest::RestClient;
use super::socket::{self, SocketConfig};
use crate::config::LavalinkConfig;
use crate::player::{AudioBackend, BackendError, PlayerEvent};

/// Plays audio through Lavalink, using songbird only for the voice handshake.
pub struct LavalinkBackend {
    rest: RestClient,
    voice: Arc<Songbird>,
    node: Arc<NodeState>,
    events: mpsc::Sender<PlayerEvent>,
    config: LavalinkConfig,
    shutdown: watch::Sender<bool>,
    socket: Mutex<Option<JoinHandle<()>>>,
}

impl LavalinkBackend {
    /// Creates a backend. Nothing connects until [`Self::start`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        config: &LavalinkConfig,
        voice: Arc<Songbird>,
        events: mpsc::Sender<PlayerEvent>,
    ) -> Result<Self, BackendError> {
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            rest: RestClient::new(config)?,
            voice,
            node: Arc::new(NodeState::new()),
            events,
            config: config.clone(),
            shutdown,
            socket: Mutex::new(None),
        })
    }

    /// Opens the node socket for the bot user. Later calls are no-ops.
    pub async fn start(&self, user_id: UserId) {
        let mut socket = self.socket.lock().await;
        if socket.is_some() {
            debug!("Lavalink socket already running");
            return;
        }

        info!("Starting Lavalink connection for user {}", user_id);

        let config = SocketConfig {
            url: self.config.websocket_url(),
            password: self.config.password.clone(),
            user_id,
        };
        *socket = Some(tokio::spawn(socket::run(
            config,
            Arc::clone(&self.node),
            self.events.clone(),
            self.shutdown.subscribe(),
        )));
    }

    /// Closes the node socket and waits for it to finish.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        if let Some(handle) = self.socket.lock().await.take()
            && let Err(e) = handle.await
        {
            warn!("Lavalink socket task failed: {}", e);
        }
    }

    /// Records that the bot was moved to another channel by someone else.
    pub async fn note_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        if self
            .node
            .update_player(guild_id, |slot| slot.channel_id = channel_id)
            .await
        {
            debug!("Bot moved to channel {} in guild {}", channel_id, guild_id);
        }
    }

    async fn session(&self) -> Result<String, BackendError> {
        self.node.session_id().await.ok_or(BackendError::NotReady)
    }
}

impl AudioBackend for LavalinkBackend {
    type Track = Track;

    async fn search(&self, identifier: &str) -> Result<Vec<Track>, BackendError> {
        self.rest.load_tracks(identifier).await?.into_tracks()
    }

    async fn connected_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.node.player(guild_id).await.map(|slot| slot.channel_id)
    }

    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BackendError> {
        let session_id = self.session().await?;

        let (info, _call) = self
            .voice
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(|e| BackendError::Voice(e.to_string()))?;

        let voice = VoiceServer {
            token: info.token,
            endpoint: info.endpoint,
            session_id: info.session_id,
        };
        self.rest
            .update_player(&session_id, guild_id, &UpdatePlayer::voice(voice.clone()))
            .await?;

        let current = self.node.player(guild_id).await.and_then(|slot| slot.current);
        self.node
            .insert_player(
                guild_id,
                PlayerSlot {
                    channel_id,
                    voice,
                    synced_session: Some(session_id),
                    current,
                },
            )
            .await;

        Ok(())
    }

    async fn is_playing(&self, guild_id: GuildId) -> bool {
        self.node
            .player(guild_id)
            .await
            .is_some_and(|slot| slot.current.is_some())
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), BackendError> {
        let session_id = self.session().await?;
        let slot = self
            .node
            .player(guild_id)
            .await
            .ok_or_else(|| BackendError::Voice("not connected to voice".to_owned()))?;

        let mut update = UpdatePlayer::play(&track.encoded);
        // A new node session has no player yet; it needs the voice details again.
        if slot.synced_session.as_deref() != Some(session_id.as_str()) {
            update.voice = Some(slot.voice);
        }

        // Set before the request: a load failure may be reported before it returns.
        let playing = track.clone();
        self.node
            .update_player(guild_id, |slot| slot.current = Some(playing))
            .await;

        if let Err(e) = self.rest.update_player(&session_id, guild_id, &update).await {
            self.node.update_player(guild_id, |slot| slot.current = None).await;
            return Err(e);
        }

        self.node
            .update_player(guild_id, |slot| slot.synced_session = Some(session_id))
            .await;
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), BackendError> {
        let session_id = self.session().await?;
        self.rest
            .update_player(&session_id, guild_id, &UpdatePlayer::stop())
            .await?;
        self.node.update_player(guild_id, |slot| slot.current = None).await;
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), BackendError> {
        self.node.remove_player(guild_id).await;

        let destroyed = match self.node.session_id().await {
            Some(session_id) => self.rest.destroy_player(&session_id, guild_id).await,
            None => Ok(()),
        };

        match self.voice.remove(guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => {}
            Err(e) => return Err(BackendError::Voice(e.to_string())),
        }

        destroyed
    }
}

impl std::fmt::Debug for LavalinkBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LavalinkBackend")
            .field("rest", &self.rest)
            .finish_non_exhaustive()
    }
}
