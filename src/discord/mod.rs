//! Discord adapter.
//!
//! Connects gateway events to the rest of the bot: slash commands go to
//! the command handler, voice state changes to the player manager.

mod handler;
mod registration;

pub use handler::Handler;
pub use registration::build_commands;
