//! Command handler implementation.

use std::sync::Arc;

use serenity::model::id::GuildId;
use tracing::{debug, info, warn};

use super::types::{CommandContext, CommandResult, MusicCommand};
use crate::config::{MESSAGE_LIMIT, QUEUE_DISPLAY_LIMIT, QUEUE_TITLE_LIMIT};
use crate::player::{AudioBackend, PlayerError, PlayerManager, Playable};

/// Executes music commands against the player manager.
pub struct CommandHandler<B: AudioBackend> {
    players: Arc<PlayerManager<B>>,
}

impl<B: AudioBackend> CommandHandler<B> {
    /// Creates a new command handler.
    #[must_use]
    pub fn new(players: Arc<PlayerManager<B>>) -> Self {
        Self { players }
    }

    /// Executes a parsed command and renders the reply.
    pub async fn handle(&self, ctx: CommandContext, command: MusicCommand) -> CommandResult {
        debug!("Handling command: {}", command);

        let Some(guild_id) = ctx.guild_id else {
            return error_result(&PlayerError::NotInGuild);
        };

        let result = match command {
            MusicCommand::Play(query) => self.handle_play(guild_id, ctx, &query).await,
            MusicCommand::Queue => Ok(self.handle_queue(guild_id).await),
            MusicCommand::Remove(index) => Ok(self.handle_remove(guild_id, index).await),
            MusicCommand::Skip => self.handle_skip(guild_id).await,
            MusicCommand::Stop => self.handle_stop(guild_id).await,
            MusicCommand::Leave => self.handle_leave(guild_id).await,
        };

        let result = result.unwrap_or_else(|e| {
            warn!("Command failed in guild {}: {}", guild_id, e);
            error_result(&e)
        });
        info!("Command result: success={}, ephemeral={}", result.success, result.ephemeral);

        result
    }

    async fn handle_play(
        &self,
        guild_id: GuildId,
        ctx: CommandContext,
        query: &str,
    ) -> Result<CommandResult, PlayerError> {
        self.players
            .ensure_connected(guild_id, ctx.is_member, ctx.voice_channel)
            .await?;

        let backend = self.players.backend();
        let shared = self.players.state(guild_id).await;
        let mut state = shared.lock().await;

        let track = self.players.resolve_track(query).await?;
        state.cancel_idle();

        if backend.is_playing(guild_id).await {
            let message = format!(
                "✅ Added to queue: **{}** ({} in queue)",
                track.title(),
                state.queue.len() + 1
            );
            state.queue.push_back(track);
            Ok(CommandResult::success(message))
        } else {
            backend.play(guild_id, &track).await?;
            Ok(CommandResult::success(format!("▶️ Now playing: **{}**", track.title())))
        }
    }

    async fn handle_queue(&self, guild_id: GuildId) -> CommandResult {
        let shared = self.players.state(guild_id).await;
        let state = shared.lock().await;

        if state.queue.is_empty() {
            return CommandResult::success("The queue is empty.");
        }

        let total = state.queue.len();
        let footer = format!("\n... ({total} tracks total)");

        let mut message = "🎶 **Queue**".to_owned();
        let mut length = message.chars().count();
        let mut shown = 0;
        for (i, track) in state.queue.iter().take(QUEUE_DISPLAY_LIMIT).enumerate() {
            let line = format!("\n{}. {}", i + 1, shorten(track.title(), QUEUE_TITLE_LIMIT));
            let line_length = line.chars().count();
            // Keep room for the footer so the reply stays within Discord's limit.
            if length + line_length + footer.chars().count() > MESSAGE_LIMIT {
                break;
            }
            message.push_str(&line);
            length += line_length;
            shown += 1;
        }
        if shown < total {
            message.push_str(&footer);
        }

        CommandResult::success(message)
    }

    async fn handle_remove(&self, guild_id: GuildId, index: i64) -> CommandResult {
        let shared = self.players.state(guild_id).await;
        let mut state = shared.lock().await;

        match state.remove_position(index) {
            Some(removed) => CommandResult::success(format!("🗑️ Removed: **{}**", removed.title())),
            None => CommandResult::error("Index is out of range."),
        }
    }

    async fn handle_skip(&self, guild_id: GuildId) -> Result<CommandResult, PlayerError> {
        let backend = self.players.backend();
        if backend.connected_channel(guild_id).await.is_none() || !backend.is_playing(guild_id).await {
            return Ok(CommandResult::error("Nothing is playing."));
        }

        // The track end event plays the next queued track.
        backend.stop(guild_id).await?;
        Ok(CommandResult::success("⏭️ Skipped."))
    }

    async fn handle_stop(&self, guild_id: GuildId) -> Result<CommandResult, PlayerError> {
        let backend = self.players.backend();
        if backend.connected_channel(guild_id).await.is_none() {
            return Ok(CommandResult::error("The bot is not in a voice channel."));
        }

        let shared = self.players.state(guild_id).await;
        let mut state = shared.lock().await;
        state.queue.clear();
        if backend.is_playing(guild_id).await {
            backend.stop(guild_id).await?;
        }
        self.players.schedule_idle_disconnect(guild_id, &shared, &mut state);

        Ok(CommandResult::success(format!(
            "⏹️ Stopped and cleared the queue. Leaving automatically after {} seconds without commands.",
            self.players.idle_timeout().as_secs()
        )))
    }

    async fn handle_leave(&self, guild_id: GuildId) -> Result<CommandResult, PlayerError> {
        let backend = self.players.backend();
        if backend.connected_channel(guild_id).await.is_none() {
            return Ok(CommandResult::error("The bot is not in a voice channel."));
        }

        let shared = self.players.state(guild_id).await;
        let mut state = shared.lock().await;
        state.queue.clear();
        state.cancel_idle();
        backend.disconnect(guild_id).await?;

        Ok(CommandResult::success("👋 Left the voice channel."))
    }
}

impl<B: AudioBackend> std::fmt::Debug for CommandHandler<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("players", &self.players)
            .finish()
    }
}

fn error_result(error: &PlayerError) -> CommandResult {
    CommandResult::error(format!("⚠️ {error}"))
}

/// Cuts a title to `limit` characters, marking the cut with an ellipsis.
fn shorten(title: &str, limit: usize) -> String {
    if title.chars().count() <= limit {
        return title.to_owned();
    }
    let mut short: String = title.chars().take(limit.saturating_sub(1)).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serenity::model::id::ChannelId;

    use super::*;
    use crate::player::testing::{FakeBackend, FakeTrack};

    const GUILD: GuildId = GuildId::new(7);
    const VOICE: ChannelId = ChannelId::new(8);

    fn in_voice() -> CommandContext {
        CommandContext {
            guild_id: Some(GUILD),
            is_member: true,
            voice_channel: Some(VOICE),
        }
    }

    fn handler(backend: FakeBackend) -> CommandHandler<FakeBackend> {
        let players = PlayerManager::new(Arc::new(backend), Duration::from_secs(120));
        CommandHandler::new(Arc::new(players))
    }

    async fn queue_titles(handler: &CommandHandler<FakeBackend>) -> Vec<String> {
        let shared = handler.players.state(GUILD).await;
        let state = shared.lock().await;
        state.queue.iter().map(|t| t.0.clone()).collect()
    }

    #[tokio::test]
    async fn test_play_starts_when_idle() {
        let handler = handler(FakeBackend::with_catalog(&[("ytsearch:song", &["Song"])]));

        let result = handler.handle(in_voice(), MusicCommand::Play("song".to_owned())).await;

        assert!(result.success);
        assert_eq!(result.message, "▶️ Now playing: **Song**");
        assert_eq!(
            handler.players.backend().calls(),
            vec!["join 8", "search ytsearch:song", "play Song"]
        );
    }

    #[tokio::test]
    async fn test_play_queues_when_busy() {
        let backend = FakeBackend::with_catalog(&[("https://x.test/a", &["Linked"])]);
        backend.connect(GUILD, VOICE);
        backend.set_playing(GUILD, "Current");
        let handler = handler(backend);

        let result = handler
            .handle(in_voice(), MusicCommand::Play("https://x.test/a".to_owned()))
            .await;

        assert_eq!(result.message, "✅ Added to queue: **Linked** (1 in queue)");
        assert_eq!(queue_titles(&handler).await, vec!["Linked"]);
        assert_eq!(handler.players.backend().playing(GUILD).as_deref(), Some("Current"));
    }

    #[tokio::test]
    async fn test_play_requires_voice_channel() {
        let handler = handler(FakeBackend::default());
        let ctx = CommandContext {
            voice_channel: None,
            ..in_voice()
        };

        let result = handler.handle(ctx, MusicCommand::Play("song".to_owned())).await;

        assert!(!result.success);
        assert!(result.ephemeral);
        assert_eq!(result.message, "⚠️ Join a voice channel first.");
        assert!(handler.players.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_play_track_not_found() {
        let handler = handler(FakeBackend::default());
        let result = handler.handle(in_voice(), MusicCommand::Play("missing".to_owned())).await;
        assert_eq!(result.message, "⚠️ No track found.");
        assert!(result.ephemeral);
    }

    #[tokio::test]
    async fn test_outside_guild() {
        let handler = handler(FakeBackend::default());
        let result = handler.handle(CommandContext::default(), MusicCommand::Queue).await;
        assert_eq!(result.message, "⚠️ This command can only be used in a server.");
    }

    #[tokio::test]
    async fn test_queue_listing() {
        let handler = handler(FakeBackend::default());
        assert_eq!(
            handler.handle(in_voice(), MusicCommand::Queue).await.message,
            "The queue is empty."
        );

        {
            let shared = handler.players.state(GUILD).await;
            let mut state = shared.lock().await;
            for i in 1..=22 {
                state.queue.push_back(FakeTrack(format!("Track {i}")));
            }
        }

        let result = handler.handle(in_voice(), MusicCommand::Queue).await;
        let lines: Vec<_> = result.message.lines().collect();
        assert_eq!(lines[0], "🎶 **Queue**");
        assert_eq!(lines[1], "1. Track 1");
        assert_eq!(lines[20], "20. Track 20");
        assert_eq!(lines[21], "... (22 tracks total)");
        assert_eq!(lines.len(), 22);
    }

    #[tokio::test]
    async fn test_queue_listing_stays_within_message_limit() {
        let handler = handler(FakeBackend::default());
        {
            let shared = handler.players.state(GUILD).await;
            let mut state = shared.lock().await;
            for i in 1..=25 {
                state.queue.push_back(FakeTrack(format!("{i} {}", "x".repeat(300))));
            }
        }

        let result = handler.handle(in_voice(), MusicCommand::Queue).await;

        assert!(result.message.chars().count() <= MESSAGE_LIMIT);
        assert!(result.message.ends_with("... (25 tracks total)"));
        let first = result.message.lines().nth(1).unwrap();
        assert!(first.starts_with("1. 1 xxx"));
        assert!(first.ends_with('…'));
        assert_eq!(first.chars().count(), "1. ".len() + QUEUE_TITLE_LIMIT);
    }

    #[test]
    fn test_shorten() {
        assert_eq!(shorten("short", 10), "short");
        assert_eq!(shorten("exactly10!", 10), "exactly10!");
        assert_eq!(shorten("a longer title", 8), "a longe…");
    }

    #[tokio::test]
    async fn test_remove() {
        let handler = handler(FakeBackend::default());
        {
            let shared = handler.players.state(GUILD).await;
            let mut state = shared.lock().await;
            state.queue.push_back(FakeTrack("A".to_owned()));
            state.queue.push_back(FakeTrack("B".to_owned()));
        }

        let out_of_range = handler.handle(in_voice(), MusicCommand::Remove(3)).await;
        assert_eq!(out_of_range.message, "Index is out of range.");
        assert!(out_of_range.ephemeral);

        let removed = handler.handle(in_voice(), MusicCommand::Remove(1)).await;
        assert_eq!(removed.message, "🗑️ Removed: **A**");
        assert_eq!(queue_titles(&handler).await, vec!["B"]);
    }

    #[tokio::test]
    async fn test_skip() {
        let backend = FakeBackend::default();
        backend.connect(GUILD, VOICE);
        let handler = handler(backend);

        let idle = handler.handle(in_voice(), MusicCommand::Skip).await;
        assert_eq!(idle.message, "Nothing is playing.");

        handler.players.backend().set_playing(GUILD, "Song");
        let skipped = handler.handle(in_voice(), MusicCommand::Skip).await;
        assert_eq!(skipped.message, "⏭️ Skipped.");
        assert_eq!(handler.players.backend().calls(), vec!["stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_clears_queue_and_leaves_after_timeout() {
        let backend = FakeBackend::default();
        backend.connect(GUILD, VOICE);
        backend.set_playing(GUILD, "Song");
        let handler = handler(backend);
        {
            let shared = handler.players.state(GUILD).await;
            shared.lock().await.queue.push_back(FakeTrack("Queued".to_owned()));
        }

        let result = handler.handle(in_voice(), MusicCommand::Stop).await;
        assert!(result.success);
        assert!(result.message.contains("120 seconds"));
        assert!(queue_titles(&handler).await.is_empty());
        assert_eq!(handler.players.backend().channel(GUILD), Some(VOICE));

        tokio::time::sleep(Duration::from_secs(121)).await;

        assert_eq!(handler.players.backend().channel(GUILD), None);
        assert_eq!(handler.players.backend().calls(), vec!["stop", "disconnect"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_after_stop_cancels_idle_timer() {
        let backend = FakeBackend::with_catalog(&[("ytsearch:again", &["Again"])]);
        backend.connect(GUILD, VOICE);
        let handler = handler(backend);

        handler.handle(in_voice(), MusicCommand::Stop).await;
        handler.handle(in_voice(), MusicCommand::Play("again".to_owned())).await;
        handler.players.backend().finish_track(GUILD);

        tokio::time::sleep(Duration::from_secs(121)).await;

        assert_eq!(handler.players.backend().channel(GUILD), Some(VOICE));
    }

    #[tokio::test]
    async fn test_stop_and_leave_when_not_connected() {
        let handler = handler(FakeBackend::default());

        let stop = handler.handle(in_voice(), MusicCommand::Stop).await;
        assert_eq!(stop.message, "The bot is not in a voice channel.");
        let leave = handler.handle(in_voice(), MusicCommand::Leave).await;
        assert_eq!(leave.message, "The bot is not in a voice channel.");
    }

    #[tokio::test]
    async fn test_leave() {
        let backend = FakeBackend::default();
        backend.connect(GUILD, VOICE);
        let handler = handler(backend);
        {
            let shared = handler.players.state(GUILD).await;
            shared.lock().await.queue.push_back(FakeTrack("Queued".to_owned()));
        }

        let result = handler.handle(in_voice(), MusicCommand::Leave).await;

        assert_eq!(result.message, "👋 Left the voice channel.");
        assert_eq!(handler.players.backend().channel(GUILD), None);
        assert!(queue_titles(&handler).await.is_empty());
    }
}
