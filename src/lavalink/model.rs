//! Lavalink v4 payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serenity::model::id::GuildId;

use crate::player::{BackendError, Playable};

/// A loaded track. `encoded` is the opaque blob Lavalink plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub encoded: String,
    pub info: TrackInfo,
    #[serde(default)]
    pub plugin_info: Value,
    #[serde(default)]
    pub user_data: Value,
}

impl Playable for Track {
    fn title(&self) -> &str {
        &self.info.title
    }
}

/// Metadata of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub identifier: String,
    #[serde(default)]
    pub is_seekable: bool,
    #[serde(default)]
    pub author: String,
    /// Length in milliseconds.
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    #[serde(default)]
    pub position: u64,
    pub title: String,
    pub uri: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub source_name: String,
}

/// Playlist returned by a track load.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistData {
    pub info: PlaylistInfo,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub name: String,
    /// Index of the selected track, `-1` if none.
    #[serde(default = "no_selection")]
    pub selected_track: i64,
}

const fn no_selection() -> i64 {
    -1
}

/// Error details for a failed load or a track exception.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exception {
    pub message: Option<String>,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub cause: String,
}

impl Exception {
    fn describe(&self) -> String {
        self.message.clone().unwrap_or_else(|| self.cause.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum LoadType {
    Track,
    Playlist,
    Search,
    Empty,
    Error,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLoadResult {
    load_type: LoadType,
    #[serde(default)]
    data: Value,
}

/// Result of `GET /v4/loadtracks`.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult {
    Track(Track),
    Playlist(PlaylistData),
    Search(Vec<Track>),
    Empty,
    Error(Exception),
}

impl<'de> Deserialize<'de> for LoadResult {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;

        let raw = RawLoadResult::deserialize(deserializer)?;
        let result = match raw.load_type {
            LoadType::Track => Self::Track(serde_json::from_value(raw.data).map_err(D::Error::custom)?),
            LoadType::Playlist => {
                Self::Playlist(serde_json::from_value(raw.data).map_err(D::Error::custom)?)
            }
            LoadType::Search => Self::Search(serde_json::from_value(raw.data).map_err(D::Error::custom)?),
            LoadType::Empty => Self::Empty,
            LoadType::Error => Self::Error(serde_json::from_value(raw.data).map_err(D::Error::custom)?),
        };
        Ok(result)
    }
}

impl LoadResult {
    /// Flattens the result into candidate tracks, best match first.
    ///
    /// For playlists the selected track, if any, comes first.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::LoadFailed`] for an `error` load type.
    pub fn into_tracks(self) -> Result<Vec<Track>, BackendError> {
        match self {
            Self::Track(track) => Ok(vec![track]),
            Self::Search(tracks) => Ok(tracks),
            Self::Playlist(mut playlist) => {
                if let Ok(selected) = usize::try_from(playlist.info.selected_track)
                    && selected < playlist.tracks.len()
                {
                    let track = playlist.tracks.remove(selected);
                    playlist.tracks.insert(0, track);
                }
                Ok(playlist.tracks)
            }
            Self::Empty => Ok(Vec::new()),
            Self::Error(exception) => Err(BackendError::LoadFailed(exception.describe())),
        }
    }
}

/// Why a track stopped playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

/// Player position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub ping: i64,
}

/// Node statistics, reduced to the fields the bot logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    #[serde(default)]
    pub players: u32,
    #[serde(default)]
    pub playing_players: u32,
    #[serde(default)]
    pub uptime: u64,
}

/// Message received on the node WebSocket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IncomingMessage {
    Ready {
        resumed: bool,
        session_id: String,
    },
    PlayerUpdate {
        guild_id: String,
        state: PlayerState,
    },
    Stats(Stats),
    Event(NodeEvent),
    #[serde(other)]
    Unknown,
}

/// Player event pushed by the node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum NodeEvent {
    TrackStartEvent {
        guild_id: String,
        track: Track,
    },
    TrackEndEvent {
        guild_id: String,
        track: Track,
        reason: TrackEndReason,
    },
    TrackExceptionEvent {
        guild_id: String,
        track: Track,
        exception: Exception,
    },
    TrackStuckEvent {
        guild_id: String,
        track: Track,
        threshold_ms: u64,
    },
    WebSocketClosedEvent {
        guild_id: String,
        code: u16,
        reason: String,
        by_remote: bool,
    },
    #[serde(other)]
    Unknown,
}

/// Body of `PATCH /v4/sessions/{session}/players/{guild}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<UpdatePlayerTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<VoiceServer>,
}

impl UpdatePlayer {
    /// Starts playing an encoded track.
    #[must_use]
    pub fn play(encoded: &str) -> Self {
        Self {
            track: Some(UpdatePlayerTrack {
                encoded: Some(encoded.to_owned()),
            }),
            voice: None,
        }
    }

    /// Stops the current track.
    #[must_use]
    pub fn stop() -> Self {
        Self {
            track: Some(UpdatePlayerTrack { encoded: None }),
            voice: None,
        }
    }

    /// Only forwards voice connection details.
    #[must_use]
    pub fn voice(voice: VoiceServer) -> Self {
        Self {
            track: None,
            voice: Some(voice),
        }
    }
}

/// Track part of a player update. `None` serializes as `null`, which stops playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePlayerTrack {
    pub encoded: Option<String>,
}

/// Discord voice server details forwarded to Lavalink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceServer {
    pub token: String,
    pub endpoint: String,
    pub session_id: String,
}

/// Error body returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Parses the string guild id Lavalink uses.
#[must_use]
pub fn parse_guild_id(raw: &str) -> Option<GuildId> {
    raw.parse::<u64>().ok().filter(|&id| id != 0).map(GuildId::new)
}
