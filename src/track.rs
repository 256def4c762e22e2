use std::fmt::{self, Display, Formatter};

pub const UNKNOWN_TITLE: &str = "Unknown title";
pub const UNKNOWN_AUTHOR: &str = "Unknown artist";

/// Immutable description of a playable item.
///
/// Resolved once from a search result, then copied by value into queues and
/// event payloads; nothing holds a back-reference to the session that queued
/// it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRef {
    pub title: String,
    pub author: String,
    pub duration_ms: u64,
    pub url: String,
    pub artwork_url: Option<String>,
}

impl TrackRef {
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        duration_ms: u64,
        url: impl Into<String>,
    ) -> Self {
        TrackRef {
            title: title.into(),
            author: author.into(),
            duration_ms,
            url: url.into(),
            artwork_url: None,
        }
    }

    #[must_use]
    pub fn with_artwork(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = Some(url.into());
        self
    }

    /// Duration rendered as `h:mm:ss` or `m:ss`.
    #[must_use]
    pub fn duration_display(&self) -> String {
        let total = self.duration_ms / 1000;
        let (hours, mins, secs) = (total / 3600, (total / 60) % 60, total % 60);
        if hours > 0 {
            format!("{hours}:{mins:02}:{secs:02}")
        } else {
            format!("{mins}:{secs:02}")
        }
    }
}

impl Display for TrackRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({})",
            self.title,
            self.author,
            self.duration_display()
        )
    }
}

/// What a search query resolved to. Playlists keep their name so replies can
/// say what was added.
#[derive(Clone, Debug)]
pub enum SearchOutcome {
    Tracks(Vec<TrackRef>),
    Playlist { name: String, tracks: Vec<TrackRef> },
}

impl SearchOutcome {
    /// All resolved tracks in input order, discarding the playlist wrapper.
    #[must_use]
    pub fn into_tracks(self) -> Vec<TrackRef> {
        match self {
            SearchOutcome::Tracks(tracks) | SearchOutcome::Playlist { tracks, .. } => tracks,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            SearchOutcome::Tracks(tracks) | SearchOutcome::Playlist { tracks, .. } => {
                tracks.is_empty()
            }
        }
    }
}
