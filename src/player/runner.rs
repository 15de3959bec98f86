//! Player event loop.
//!
//! The audio node reports track ends asynchronously; its socket task sends
//! them here so queue advancement runs with the same per-guild locking as
//! the commands.

use std::sync::Arc;

use serenity::model::id::GuildId;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{AudioBackend, PlayerManager};

/// Messages that can be sent to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    /// A track finished, was stopped or failed to load.
    TrackEnded { guild_id: GuildId },
    /// Stop the event loop.
    Shutdown,
}

/// Consumes [`PlayerEvent`]s and forwards them to the player manager.
pub struct PlayerEventLoop<B: AudioBackend> {
    players: Arc<PlayerManager<B>>,
}

impl<B: AudioBackend> PlayerEventLoop<B> {
    /// Creates a new event loop.
    #[must_use]
    pub fn new(players: Arc<PlayerManager<B>>) -> Self {
        Self { players }
    }

    /// Runs until [`PlayerEvent::Shutdown`] arrives or all senders are gone.
    pub async fn run(&self, mut rx: mpsc::Receiver<PlayerEvent>) {
        info!("Player event loop started");

        loop {
            match rx.recv().await {
                Some(PlayerEvent::TrackEnded { guild_id }) => {
                    debug!("Track ended in guild {}", guild_id);
                    self.players.on_track_end(guild_id).await;
                }
                Some(PlayerEvent::Shutdown) | None => {
                    info!("Player event loop shutting down");
                    break;
                }
            }
        }
    }
}

impl<B: AudioBackend> std::fmt::Debug for PlayerEventLoop<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerEventLoop").finish_non_exhaustive()
    }
}
