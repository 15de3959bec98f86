//! In-memory audio backend for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use serenity::model::id::{ChannelId, GuildId};

use super::{AudioBackend, BackendError, Playable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeTrack(pub String);

impl Playable for FakeTrack {
    fn title(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default)]
struct Inner {
    connected: HashMap<GuildId, ChannelId>,
    playing: HashMap<GuildId, FakeTrack>,
    catalog: HashMap<String, Vec<FakeTrack>>,
    calls: Vec<String>,
}

/// Records every call and keeps just enough state to answer queries.
#[derive(Debug, Default)]
pub struct FakeBackend {
    inner: Mutex<Inner>,
}

impl FakeBackend {
    pub fn with_catalog(entries: &[(&str, &[&str])]) -> Self {
        let backend = Self::default();
        {
            let mut inner = backend.inner.lock().unwrap();
            for (identifier, titles) in entries {
                inner.catalog.insert(
                    (*identifier).to_owned(),
                    titles.iter().map(|t| FakeTrack((*t).to_owned())).collect(),
                );
            }
        }
        backend
    }

    pub fn connect(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.inner.lock().unwrap().connected.insert(guild_id, channel_id);
    }

    pub fn set_playing(&self, guild_id: GuildId, title: &str) {
        self.inner
            .lock()
            .unwrap()
            .playing
            .insert(guild_id, FakeTrack(title.to_owned()));
    }

    pub fn finish_track(&self, guild_id: GuildId) {
        self.inner.lock().unwrap().playing.remove(&guild_id);
    }

    pub fn playing(&self, guild_id: GuildId) -> Option<String> {
        self.inner.lock().unwrap().playing.get(&guild_id).map(|t| t.0.clone())
    }

    pub fn channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.inner.lock().unwrap().connected.get(&guild_id).copied()
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn record(&self, call: String) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

impl AudioBackend for FakeBackend {
    type Track = FakeTrack;

    async fn search(&self, identifier: &str) -> Result<Vec<FakeTrack>, BackendError> {
        self.record(format!("search {identifier}"));
        Ok(self
            .inner
            .lock()
            .unwrap()
            .catalog
            .get(identifier)
            .cloned()
            .unwrap_or_default())
    }

    async fn connected_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channel(guild_id)
    }

    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BackendError> {
        self.record(format!("join {channel_id}"));
        self.connect(guild_id, channel_id);
        Ok(())
    }

    async fn is_playing(&self, guild_id: GuildId) -> bool {
        self.playing(guild_id).is_some()
    }

    async fn play(&self, guild_id: GuildId, track: &FakeTrack) -> Result<(), BackendError> {
        self.record(format!("play {}", track.0));
        self.set_playing(guild_id, &track.0);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), BackendError> {
        self.record("stop".to_owned());
        self.finish_track(guild_id);
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), BackendError> {
        self.record("disconnect".to_owned());
        let mut inner = self.inner.lock().unwrap();
        inner.connected.remove(&guild_id);
        inner.playing.remove(&guild_id);
        Ok(())
    }
}
