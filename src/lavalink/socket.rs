//! Lavalink WebSocket connection.
//!
//! The socket delivers the session id needed for every player request and
//! the track events that drive the queue. It reconnects with capped
//! exponential backoff until shutdown.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serenity::model::id::UserId;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, InvalidHeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, trace, warn};

use super::CLIENT_NAME;
use super::model::{IncomingMessage, NodeEvent, TrackEndReason, parse_guild_id};
use super::node::NodeState;
use crate::player::{PlayerEvent, Playable};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
enum SocketError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// Connection parameters for the node socket.
#[derive(Clone)]
pub struct SocketConfig {
    pub url: String,
    pub password: String,
    pub user_id: UserId,
}

impl std::fmt::Debug for SocketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketConfig")
            .field("url", &self.url)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Keeps a socket to the node open until `shutdown` flips to `true`.
pub async fn run(
    config: SocketConfig,
    node: Arc<NodeState>,
    events: mpsc::Sender<PlayerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match connect(&config).await {
            Ok(mut stream) => {
                info!("Connected to Lavalink at {}", config.url);
                backoff = INITIAL_BACKOFF;

                loop {
                    tokio::select! {
                        msg = stream.next() => match msg {
                            Some(Ok(Message::Text(text))) => handle_message(&node, &events, &text).await,
                            Some(Ok(Message::Close(frame))) => {
                                warn!("Lavalink closed the connection: {:?}", frame);
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("Lavalink socket error: {}", e);
                                break;
                            }
                            None => break,
                        },
                        _ = shutdown.changed() => {
                            info!("Closing Lavalink connection");
                            node.set_session(None).await;
                            return;
                        }
                    }
                }
            }
            Err(e) => error!("Failed to connect to Lavalink at {}: {}", config.url, e),
        }

        node.set_session(None).await;
        if *shutdown.borrow() {
            return;
        }

        warn!("Reconnecting to Lavalink in {:?}", backoff);
        tokio::select! {
            () = tokio::time::sleep(backoff) => {}
            _ = shutdown.changed() => return,
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn connect(
    config: &SocketConfig,
) -> Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    SocketError,
> {
    let mut request = config.url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&config.password)?);
    headers.insert("user-id", HeaderValue::from(config.user_id.get()));
    headers.insert("client-name", HeaderValue::from_static(CLIENT_NAME));

    let (stream, _response) = connect_async(request).await?;
    Ok(stream)
}

/// Applies one socket message to the node state and forwards track ends.
pub async fn handle_message(node: &NodeState, events: &mpsc::Sender<PlayerEvent>, text: &str) {
    let message: IncomingMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring malformed Lavalink message: {}", e);
            return;
        }
    };

    match message {
        IncomingMessage::Ready { resumed, session_id } => {
            info!("Lavalink session ready: {} (resumed: {})", session_id, resumed);
            node.set_session(Some(session_id)).await;

            if !resumed {
                // Players of a previous session are gone on the node side.
                for guild_id in node.clear_all_tracks().await {
                    send(events, PlayerEvent::TrackEnded { guild_id }).await;
                }
            }
        }
        IncomingMessage::PlayerUpdate { guild_id, state } => {
            trace!(
                "Player update for guild {}: position={}ms connected={}",
                guild_id, state.position, state.connected
            );
        }
        IncomingMessage::Stats(stats) => {
            debug!(
                "Lavalink stats: {} players, {} playing, uptime {}s",
                stats.players,
                stats.playing_players,
                stats.uptime / 1000
            );
        }
        IncomingMessage::Event(event) => handle_event(node, events, event).await,
        IncomingMessage::Unknown => debug!("Ignoring unknown Lavalink op"),
    }
}

async fn handle_event(node: &NodeState, events: &mpsc::Sender<PlayerEvent>, event: NodeEvent) {
    match event {
        NodeEvent::TrackStartEvent { guild_id, track } => {
            debug!("Track started in guild {}: \"{}\"", guild_id, track.title());
        }
        NodeEvent::TrackEndEvent {
            guild_id,
            track,
            reason,
        } => {
            debug!(
                "Track ended in guild {}: \"{}\" ({:?})",
                guild_id,
                track.title(),
                reason
            );
            if reason == TrackEndReason::Replaced {
                return;
            }
            let Some(guild_id) = parse_guild_id(&guild_id) else {
                warn!("Track end for invalid guild id: {}", guild_id);
                return;
            };

            if !node.end_track(guild_id, &track.encoded).await {
                debug!("Ignoring stale track end in guild {}", guild_id);
                return;
            }
            send(events, PlayerEvent::TrackEnded { guild_id }).await;
        }
        NodeEvent::TrackExceptionEvent {
            guild_id,
            track,
            exception,
        } => {
            warn!(
                "Track \"{}\" failed in guild {}: {} ({})",
                track.title(),
                guild_id,
                exception.message.as_deref().unwrap_or("unknown error"),
                exception.severity
            );
        }
        NodeEvent::TrackStuckEvent {
            guild_id,
            track,
            threshold_ms,
        } => {
            warn!(
                "Track \"{}\" stuck in guild {} for {}ms",
                track.title(),
                guild_id,
                threshold_ms
            );
        }
        NodeEvent::WebSocketClosedEvent {
            guild_id,
            code,
            reason,
            by_remote,
        } => {
            warn!(
                "Voice socket closed in guild {}: {} {} (by remote: {})",
                guild_id, code, reason, by_remote
            );
        }
        NodeEvent::Unknown => debug!("Ignoring unknown Lavalink event"),
    }
}

async fn send(events: &mpsc::Sender<PlayerEvent>, event: PlayerEvent) {
    if events.send(event).await.is_err() {
        debug!("Player event loop is gone, dropping {:?}", event);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use serenity::model::id::{ChannelId, GuildId};

    use super::*;
    use crate::lavalink::model::{Track, VoiceServer};
    use crate::lavalink::node::PlayerSlot;

    fn track_json() -> serde_json::Value {
        json!({
            "encoded": "enc",
            "info": { "identifier": "id", "title": "Song", "uri": null }
        })
    }

    fn track() -> Track {
        serde_json::from_value(track_json()).unwrap()
    }

    async fn node_with_player(guild_id: GuildId) -> NodeState {
        let node = NodeState::new();
        node.insert_player(
            guild_id,
            PlayerSlot {
                channel_id: ChannelId::new(3),
                voice: VoiceServer {
                    token: "t".to_owned(),
                    endpoint: "e".to_owned(),
                    session_id: "s".to_owned(),
                },
                synced_session: Some("old".to_owned()),
                current: Some(track()),
            },
        )
        .await;
        node
    }

    fn end_event(reason: &str) -> String {
        json!({
            "op": "event",
            "type": "TrackEndEvent",
            "guildId": "11",
            "track": track_json(),
            "reason": reason
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_ready_sets_session() {
        let node = NodeState::new();
        let (tx, _rx) = mpsc::channel(4);

        handle_message(&node, &tx, r#"{"op":"ready","resumed":false,"sessionId":"s1"}"#).await;

        assert_eq!(node.session_id().await.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_track_end_clears_and_forwards() {
        let guild_id = GuildId::new(11);
        let node = node_with_player(guild_id).await;
        let (tx, mut rx) = mpsc::channel(4);

        handle_message(&node, &tx, &end_event("finished")).await;

        assert!(node.player(guild_id).await.unwrap().current.is_none());
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::TrackEnded { guild_id });
    }

    #[tokio::test]
    async fn test_replaced_track_is_ignored() {
        let guild_id = GuildId::new(11);
        let node = node_with_player(guild_id).await;
        let (tx, mut rx) = mpsc::channel(4);

        handle_message(&node, &tx, &end_event("replaced")).await;

        assert!(node.player(guild_id).await.unwrap().current.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_track_end_keeps_current_track() {
        let guild_id = GuildId::new(11);
        let node = node_with_player(guild_id).await;
        node.update_player(guild_id, |slot| {
            slot.current = Some(
                serde_json::from_value(json!({
                    "encoded": "new",
                    "info": { "identifier": "new", "title": "New", "uri": null }
                }))
                .unwrap(),
            );
        })
        .await;
        let (tx, mut rx) = mpsc::channel(4);

        handle_message(&node, &tx, &end_event("cleanup")).await;

        let current = node.player(guild_id).await.unwrap().current.unwrap();
        assert_eq!(current.info.title, "New");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_track_end_after_stop_is_forwarded() {
        let guild_id = GuildId::new(11);
        let node = node_with_player(guild_id).await;
        node.update_player(guild_id, |slot| slot.current = None).await;
        let (tx, mut rx) = mpsc::channel(4);

        handle_message(&node, &tx, &end_event("stopped")).await;

        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::TrackEnded { guild_id });
    }

    #[tokio::test]
    async fn test_new_session_resets_playing_players() {
        let guild_id = GuildId::new(11);
        let node = node_with_player(guild_id).await;
        let (tx, mut rx) = mpsc::channel(4);

        handle_message(&node, &tx, r#"{"op":"ready","resumed":false,"sessionId":"s2"}"#).await;

        assert!(node.player(guild_id).await.unwrap().current.is_none());
        assert_eq!(rx.try_recv().unwrap(), PlayerEvent::TrackEnded { guild_id });
    }

    #[tokio::test]
    async fn test_malformed_message_is_ignored() {
        let node = NodeState::new();
        let (tx, mut rx) = mpsc::channel(4);

        handle_message(&node, &tx, "not json").await;

        assert_eq!(node.session_id().await, None);
        assert!(rx.try_recv().is_err());
    }
}
