//! Gateway event handler.

use std::sync::Arc;

use serenity::async_trait;
use serenity::builder::{
    CreateInteractionResponse, CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
};
use serenity::cache::Cache;
use serenity::client::{Context, EventHandler};
use serenity::model::application::{Command, CommandInteraction, Interaction, ResolvedValue};
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::model::voice::VoiceState;
use tracing::{debug, error, info, warn};

use super::registration::build_commands;
use crate::commands::{
    COMMAND_DEFS, CommandContext, CommandHandler, CommandResult, MusicCommand, OptionValue,
};
use crate::lavalink::LavalinkBackend;
use crate::player::{PlayerManager, VoiceChange};

/// Routes gateway events to the command handler and the player manager.
pub struct Handler {
    commands: CommandHandler<LavalinkBackend>,
    players: Arc<PlayerManager<LavalinkBackend>>,
}

impl Handler {
    /// Creates a new handler.
    #[must_use]
    pub fn new(players: Arc<PlayerManager<LavalinkBackend>>) -> Self {
        Self {
            commands: CommandHandler::new(Arc::clone(&players)),
            players,
        }
    }

    async fn run_command(&self, ctx: &Context, interaction: &CommandInteraction) {
        let options: Vec<(&str, OptionValue)> = interaction
            .data
            .options()
            .into_iter()
            .filter_map(|option| {
                let value = match option.value {
                    ResolvedValue::String(value) => OptionValue::String(value.to_owned()),
                    ResolvedValue::Integer(value) => OptionValue::Integer(value),
                    _ => return None,
                };
                Some((option.name, value))
            })
            .collect();

        let Some(command) = MusicCommand::parse(&interaction.data.name, &options) else {
            warn!("Unknown or malformed command: /{}", interaction.data.name);
            let result = CommandResult::error("⚠️ Unknown command.");
            reply(ctx, interaction, false, &result).await;
            return;
        };

        info!(
            "Command /{} from {} in guild {:?}",
            command.name(),
            interaction.user.name,
            interaction.guild_id
        );

        let command_ctx = CommandContext {
            guild_id: interaction.guild_id,
            is_member: interaction.member.is_some(),
            voice_channel: interaction
                .guild_id
                .and_then(|guild_id| user_voice_channel(&ctx.cache, guild_id, interaction.user.id)),
        };

        let deferred = command.needs_defer();
        if deferred && let Err(e) = interaction.defer(&ctx.http).await {
            error!("Failed to defer /{}: {}", command.name(), e);
            return;
        }

        let result = self.commands.handle(command_ctx, command).await;
        reply(ctx, interaction, deferred, &result).await;
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Logged in as {} ({})", ready.user.name, ready.user.id);

        self.players.backend().start(ready.user.id).await;

        match Command::set_global_commands(&ctx.http, build_commands(COMMAND_DEFS)).await {
            Ok(commands) => info!("Synced {} slash commands", commands.len()),
            Err(e) => error!("Failed to sync slash commands: {}", e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            self.run_command(&ctx, &command).await;
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };

        if new.user_id == ctx.cache.current_user().id {
            match new.channel_id {
                Some(channel_id) => {
                    self.players.backend().note_channel(guild_id, channel_id).await;
                }
                None => self.players.on_bot_disconnected(guild_id).await,
            }
            return;
        }

        let change = VoiceChange {
            is_bot: is_bot(&ctx.cache, guild_id, &new),
            before: old.and_then(|state| state.channel_id),
            after: new.channel_id,
        };
        debug!("Voice state change in guild {}: {:?}", guild_id, change);

        let cache = Arc::clone(&ctx.cache);
        self.players
            .on_voice_state_update(guild_id, change, move |channel_id| {
                count_humans(&cache, guild_id, channel_id)
            })
            .await;
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("players", &self.players)
            .finish_non_exhaustive()
    }
}

/// Sends a command result, as a follow-up if the reply was deferred.
async fn reply(ctx: &Context, interaction: &CommandInteraction, deferred: bool, result: &CommandResult) {
    let sent = if deferred {
        let followup = CreateInteractionResponseFollowup::new()
            .content(&result.message)
            .ephemeral(result.ephemeral);
        interaction.create_followup(&ctx.http, followup).await.map(|_| ())
    } else {
        let message = CreateInteractionResponseMessage::new()
            .content(&result.message)
            .ephemeral(result.ephemeral);
        interaction
            .create_response(&ctx.http, CreateInteractionResponse::Message(message))
            .await
    };

    if let Err(e) = sent {
        error!("Failed to reply to /{}: {}", interaction.data.name, e);
    }
}

/// Voice channel a user is in, according to the cache.
fn user_voice_channel(cache: &Cache, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = cache.guild(guild_id)?;
    guild.voice_states.get(&user_id).and_then(|state| state.channel_id)
}

fn is_bot(cache: &Cache, guild_id: GuildId, state: &VoiceState) -> bool {
    if let Some(member) = &state.member {
        return member.user.bot;
    }
    cache
        .guild(guild_id)
        .and_then(|guild| guild.members.get(&state.user_id).map(|member| member.user.bot))
        .unwrap_or(false)
}

/// Counts non-bot members in a voice channel.
fn count_humans(cache: &Cache, guild_id: GuildId, channel_id: ChannelId) -> usize {
    let Some(guild) = cache.guild(guild_id) else {
        return 0;
    };

    guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id))
        .filter(|state| {
            let bot = match &state.member {
                Some(member) => member.user.bot,
                None => guild
                    .members
                    .get(&state.user_id)
                    .is_some_and(|member| member.user.bot),
            };
            !bot
        })
        .count()
}
