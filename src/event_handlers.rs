//! Songbird event notifiers. Each one translates a driver callback into a
//! tagged [`PlaybackEvent`] on the owning session's channel; no playback
//! logic lives here.

use crate::session::{PlaybackEvent, SessionSender};
use crate::track::TrackRef;

use serenity::async_trait;
use songbird::{Event, EventContext, EventHandler as VoiceEventHandler};

/// Fires when a track finishes for any reason, including an explicit stop.
pub struct TrackEndNotifier {
    pub track: TrackRef,
    pub events: SessionSender,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.events.notify(PlaybackEvent::TrackEnded(self.track.clone()));
        None
    }
}

/// Fires when the driver fails to play a track.
pub struct TrackErrorNotifier {
    pub track: TrackRef,
    pub events: SessionSender,
}

#[async_trait]
impl VoiceEventHandler for TrackErrorNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let reason = match ctx {
            EventContext::Track([(state, _), ..]) => format!("{:?}", state.playing),
            _ => "unknown playback error".to_string(),
        };
        self.events.notify(PlaybackEvent::TrackErrored {
            track: self.track.clone(),
            reason,
        });
        None
    }
}

/// Fires when the voice driver loses its connection.
pub struct DriverDisconnectNotifier {
    pub events: SessionSender,
}

#[async_trait]
impl VoiceEventHandler for DriverDisconnectNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::DriverDisconnect(_) = ctx {
            self.events
                .notify(PlaybackEvent::ConnectionChanged { connected: false });
        }
        None
    }
}
