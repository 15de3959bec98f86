//! Command handling module.
//!
//! Processes the slash commands users send to the bot: parsing their
//! options, running them against the player and rendering replies.

mod handler;
mod types;

pub use handler::CommandHandler;
pub use types::{
    COMMAND_DEFS, CommandContext, CommandResult, CommandDef, MusicCommand, OptionKind,
    OptionDef, OptionValue,
};
