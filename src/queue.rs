use crate::track::TrackRef;

use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};

pub const EMPTY_QUEUE: &str = "Queue is empty or display not built.";

/// Ordered queue of tracks waiting to play.
///
/// Owned exclusively by one session actor, so no interior locking: the actor
/// is the only writer for its guild. Created empty with the session and
/// destroyed with it.
#[derive(Clone, Debug, Default)]
pub struct PlayQueue {
    inner: VecDeque<TrackRef>,
    display: String,
}

impl PlayQueue {
    #[must_use]
    pub fn new() -> Self {
        PlayQueue {
            inner: VecDeque::new(),
            display: EMPTY_QUEUE.to_string(),
        }
    }

    /// Add a track to the tail. No limit is enforced.
    pub fn push_back(&mut self, track: TrackRef) {
        self.inner.push_back(track);
    }

    /// Append tracks to the tail, preserving input order. Used for playlists.
    pub fn append_vec(&mut self, tracks: Vec<TrackRef>) {
        self.inner.extend(tracks);
    }

    /// Remove and return the head. `None` means empty, not an error.
    pub fn pop_front(&mut self) -> Option<TrackRef> {
        self.inner.pop_front()
    }

    /// Look at the head without removing it ("up next").
    #[must_use]
    pub fn peek_front(&self) -> Option<&TrackRef> {
        self.inner.front()
    }

    /// Uniform random permutation of everything currently queued. The
    /// currently-playing track is not in the queue and is unaffected.
    pub fn shuffle(&mut self) {
        self.inner.make_contiguous().shuffle(&mut rand::rng());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Snapshot of the queued tracks in order.
    #[must_use]
    pub fn tracks(&self) -> Vec<TrackRef> {
        self.inner.iter().cloned().collect()
    }

    /// Return the display string for the queue.
    #[must_use]
    pub fn get_display(&self) -> String {
        self.display.clone()
    }

    /// Build the display string for the queue.
    /// This *must* be called before displaying the queue.
    pub fn build_display(&mut self, current: Option<&TrackRef>) {
        let now_playing = match current {
            Some(track) => format!("Now playing: {track}"),
            None => "Nothing is currently playing.".to_string(),
        };
        if self.inner.is_empty() {
            self.display = format!("{now_playing}\n\nThe queue is empty.");
            return;
        }
        let queued = self
            .inner
            .iter()
            .enumerate()
            .map(|(i, track)| format!("{}. {track}", i + 1))
            .collect::<Vec<String>>()
            .join("\n");
        self.display = format!("{now_playing}\n\n{queued}");
    }
}

impl Display for PlayQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}
