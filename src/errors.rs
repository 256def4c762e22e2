use thiserror::Error;

/// Errors surfaced by the playback core.
///
/// Everything here is caught at the command-handler boundary and turned into
/// a single user-facing reply via [`ChorusError::user_message`]; nothing
/// propagates far enough to take the process down.
#[derive(Debug, Error)]
pub enum ChorusError {
    #[error("requester is not in a voice channel")]
    NotInVoiceChannel,

    #[error("already playing in a different voice channel")]
    VoiceMismatch,

    #[error("no tracks found")]
    NoTracksFound,

    #[error("voice backend unavailable: {0}")]
    VoiceUnavailable(String),

    #[error("track search failed: {0}")]
    SearchFailed(String),

    #[error("timed out joining the voice channel")]
    JoinTimeout,

    #[error("timed out searching for tracks")]
    SearchTimeout,

    /// A command or event targeted a session that is no longer the one
    /// registered for its guild. Internal race outcome, never user-visible.
    #[error("session is no longer active")]
    StaleSession,

    #[error("discord api error: {0}")]
    Serenity(#[from] serenity::Error),
}

impl ChorusError {
    /// The one-line reply shown to the invoking user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotInVoiceChannel => "You need to be in a voice channel first.".to_string(),
            Self::VoiceMismatch => {
                "I'm already playing in a different voice channel.".to_string()
            }
            Self::NoTracksFound => "No tracks were found.".to_string(),
            Self::VoiceUnavailable(_) => {
                "Couldn't reach the voice backend. Try again in a moment.".to_string()
            }
            Self::SearchFailed(_) => "Search failed. Try again in a moment.".to_string(),
            Self::JoinTimeout => "Timed out joining the voice channel.".to_string(),
            Self::SearchTimeout => "Timed out searching for tracks.".to_string(),
            // Internal race outcome; the user never needs to know a session
            // turned over underneath their command.
            Self::StaleSession => "Something went wrong. Try again in a moment.".to_string(),
            Self::Serenity(_) => "Something went wrong talking to Discord.".to_string(),
        }
    }
}
