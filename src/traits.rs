//! Seams to the external collaborators: the voice backend, the track search
//! provider, and the chat message transport. Production adapters live in
//! `voice.rs`, `resolve.rs`, and `binder.rs`; tests substitute recording
//! fakes.

use crate::errors::ChorusError;
use crate::session::SessionSender;
use crate::track::{SearchOutcome, TrackRef};

use async_trait::async_trait;
use serenity::all::{ChannelId, GuildId, MessageId};

/// Voice connection provider. Owns the actual audio link; the session only
/// holds the opaque [`VoiceConn`] it hands back.
#[async_trait]
pub trait VoiceBackend: Send + Sync + 'static {
    /// Establish a voice connection for a guild. `events` is how the backend
    /// reports track/connection lifecycle back to the owning session.
    async fn connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
        events: SessionSender,
    ) -> Result<Box<dyn VoiceConn>, ChorusError>;

    /// Drop the voice connection for a guild. Must be a no-op if none exists.
    async fn disconnect(&self, guild: GuildId);
}

/// One established voice connection. All playback control is fire-toward-the-
/// backend; completion arrives asynchronously via [`PlaybackEvent`]s on the
/// session channel.
///
/// [`PlaybackEvent`]: crate::session::PlaybackEvent
#[async_trait]
pub trait VoiceConn: Send + Sync {
    /// Start playing a track. On success the backend emits `TrackStarted`,
    /// and eventually `TrackEnded` or `TrackErrored`, on the session channel.
    async fn play(&mut self, track: &TrackRef) -> Result<(), ChorusError>;

    async fn pause(&mut self);

    async fn resume(&mut self);

    /// Request immediate termination of the current track. The backend still
    /// emits `TrackEnded` for it.
    async fn stop_current(&mut self);
}

/// Resolves a user query to tracks. Ambiguous results are acceptable; the
/// caller picks the first.
#[async_trait]
pub trait TrackSearch: Send + Sync + 'static {
    async fn search(&self, query: &str) -> Result<SearchOutcome, ChorusError>;
}

/// Message send/edit/delete against the chat platform. Any call may fail if
/// the underlying message or channel was removed externally; callers decide
/// how much that matters.
#[async_trait]
pub trait ChatTransport: Send + Sync + 'static {
    async fn send(&self, channel: ChannelId, content: String)
        -> Result<MessageId, ChorusError>;

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: String,
    ) -> Result<(), ChorusError>;

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), ChorusError>;
}
