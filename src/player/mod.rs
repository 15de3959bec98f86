//! Music player module.
//!
//! Per-guild queues, the idle auto-disconnect timer, and the reactions to
//! track-end and voice-state events, written against the [`AudioBackend`]
//! seam.

mod backend;
mod error;
mod manager;
mod runner;
mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{AudioBackend, BackendError, Playable};
pub use error::PlayerError;
pub use manager::{PlayerManager, VoiceChange};
pub use runner::{PlayerEvent, PlayerEventLoop};
pub use state::{GuildMusicState, GuildStates, SharedGuildState};
