//! User-facing player errors.

use thiserror::Error;

use super::BackendError;

/// Errors reported back to the user who ran a command.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("This command can only be used in a server.")]
    NotInGuild,

    #[error("Could not determine member information.")]
    MemberUnavailable,

    #[error("Join a voice channel first.")]
    NotInVoice,

    #[error("No track found.")]
    TrackNotFound,

    #[error(transparent)]
    Backend(#[from] BackendError),
}
