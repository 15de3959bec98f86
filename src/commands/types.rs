//! Command types and definitions.

use std::fmt;

use serenity::model::id::{ChannelId, GuildId};

/// Value of a slash command option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
}

/// Kind of a slash command option, used for registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    String,
    Integer,
}

/// Declared option of a slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDef {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: OptionKind,
    pub required: bool,
}

/// Declared slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDef {
    pub name: &'static str,
    pub description: &'static str,
    pub options: &'static [OptionDef],
}

/// Every command the bot registers.
pub const COMMAND_DEFS: &[CommandDef] = &[
    CommandDef {
        name: "play",
        description: "Play a YouTube link or search query, or add it to the queue.",
        options: &[OptionDef {
            name: "query",
            description: "YouTube link or search terms",
            kind: OptionKind::String,
            required: true,
        }],
    },
    CommandDef {
        name: "queue",
        description: "Show the queue.",
        options: &[],
    },
    CommandDef {
        name: "remove",
        description: "Remove a track from the queue by its number.",
        options: &[OptionDef {
            name: "index",
            description: "Number of the track to remove (starting at 1)",
            kind: OptionKind::Integer,
            required: true,
        }],
    },
    CommandDef {
        name: "skip",
        description: "Skip the current track.",
        options: &[],
    },
    CommandDef {
        name: "stop",
        description: "Stop playback and clear the queue (starts the auto-leave timer).",
        options: &[],
    },
    CommandDef {
        name: "leave",
        description: "Make the bot leave the voice channel.",
        options: &[],
    },
];

/// Available bot commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MusicCommand {
    /// Play a link or search query, or queue it if something is playing.
    Play(String),

    /// Show the queue.
    Queue,

    /// Remove a queued track by its 1-based position.
    Remove(i64),

    /// Skip the current track.
    Skip,

    /// Stop playback, clear the queue and start the idle timer.
    Stop,

    /// Leave the voice channel.
    Leave,
}

impl MusicCommand {
    /// Parses a command from its name and options.
    ///
    /// Returns `None` for unknown commands or missing/mistyped options.
    #[must_use]
    pub fn parse(name: &str, options: &[(&str, OptionValue)]) -> Option<Self> {
        let option = |wanted: &str| {
            options
                .iter()
                .find(|(key, _)| *key == wanted)
                .map(|(_, value)| value)
        };

        match name {
            "play" => match option("query")? {
                OptionValue::String(query) if !query.trim().is_empty() => {
                    Some(Self::Play(query.trim().to_owned()))
                }
                _ => None,
            },
            "queue" => Some(Self::Queue),
            "remove" => match option("index")? {
                OptionValue::Integer(index) => Some(Self::Remove(*index)),
                OptionValue::String(_) => None,
            },
            "skip" => Some(Self::Skip),
            "stop" => Some(Self::Stop),
            "leave" => Some(Self::Leave),
            _ => None,
        }
    }

    /// Returns the command name as registered.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Play(_) => "play",
            Self::Queue => "queue",
            Self::Remove(_) => "remove",
            Self::Skip => "skip",
            Self::Stop => "stop",
            Self::Leave => "leave",
        }
    }

    /// Whether the command may take long enough to need a deferred reply.
    #[must_use]
    pub const fn needs_defer(&self) -> bool {
        matches!(self, Self::Play(_))
    }
}

impl fmt::Display for MusicCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Play(query) => write!(f, "play {query}"),
            Self::Remove(index) => write!(f, "remove {index}"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Where a command was invoked and by whom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandContext {
    /// Guild the command was used in, `None` in direct messages.
    pub guild_id: Option<GuildId>,

    /// Whether member information is available for the invoker.
    pub is_member: bool,

    /// Voice channel the invoker is currently in.
    pub voice_channel: Option<ChannelId>,
}

/// Result of command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,

    /// Whether only the invoker should see the response.
    pub ephemeral: bool,
}

impl CommandResult {
    /// Creates a successful, public result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ephemeral: false,
        }
    }

    /// Creates an error result visible only to the invoker.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ephemeral: true,
        }
    }
}
