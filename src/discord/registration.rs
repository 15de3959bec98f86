//! Slash command registration.

use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::CommandOptionType;

use crate::commands::{CommandDef, OptionKind};

/// Builds the registration payload for every declared command.
#[must_use]
pub fn build_commands(defs: &[CommandDef]) -> Vec<CreateCommand> {
    defs.iter().map(build_command).collect()
}

fn build_command(def: &CommandDef) -> CreateCommand {
    def.options.iter().fold(
        CreateCommand::new(def.name).description(def.description),
        |command, option| {
            let kind = match option.kind {
                OptionKind::String => CommandOptionType::String,
                OptionKind::Integer => CommandOptionType::Integer,
            };
            command.add_option(
                CreateCommandOption::new(kind, option.name, option.description)
                    .required(option.required),
            )
        },
    )
}
