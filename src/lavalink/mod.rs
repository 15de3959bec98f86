//! Lavalink v4 client.
//!
//! Talks to a single Lavalink node: REST for track loading and player
//! updates, a WebSocket for the session id and track events.

mod backend;
pub mod model;
mod node;
mod rest;
mod socket;

pub use backend::LavalinkBackend;
pub use model::Track;
pub use rest::RestClient;

/// Name sent to the node as `Client-Name` and user agent.
pub const CLIENT_NAME: &str = concat!("music_bot/", env!("CARGO_PKG_VERSION"));
