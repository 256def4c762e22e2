//! Production voice backend over songbird. All decoding, buffering, and
//! transport is the driver's problem; this adapter only starts inputs and
//! wires lifecycle notifiers back into the owning session.

use crate::errors::ChorusError;
use crate::event_handlers::{DriverDisconnectNotifier, TrackEndNotifier, TrackErrorNotifier};
use crate::session::{PlaybackEvent, SessionSender};
use crate::track::TrackRef;
use crate::traits::{VoiceBackend, VoiceConn};

use async_trait::async_trait;
use serenity::all::{ChannelId, GuildId};
use songbird::input::YoutubeDl;
use songbird::tracks::TrackHandle;
use songbird::{Call, CoreEvent, Event, Songbird, TrackEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

pub struct SongbirdBackend {
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
}

impl SongbirdBackend {
    #[must_use]
    pub fn new(manager: Arc<Songbird>, http_client: reqwest::Client) -> Self {
        SongbirdBackend {
            manager,
            http_client,
        }
    }
}

#[async_trait]
impl VoiceBackend for SongbirdBackend {
    async fn connect(
        &self,
        guild: GuildId,
        channel: ChannelId,
        events: SessionSender,
    ) -> Result<Box<dyn VoiceConn>, ChorusError> {
        let call = self
            .manager
            .join(guild, channel)
            .await
            .map_err(|e| ChorusError::VoiceUnavailable(e.to_string()))?;
        {
            let mut handler = call.lock().await;
            handler.add_global_event(
                Event::Core(CoreEvent::DriverDisconnect),
                DriverDisconnectNotifier {
                    events: events.clone(),
                },
            );
        }
        Ok(Box::new(SongbirdConn {
            call,
            http_client: self.http_client.clone(),
            events,
            current: None,
        }))
    }

    async fn disconnect(&self, guild: GuildId) {
        if let Err(e) = self.manager.remove(guild).await {
            debug!(%guild, error = %e, "voice handler already removed");
        }
    }
}

struct SongbirdConn {
    call: Arc<Mutex<Call>>,
    http_client: reqwest::Client,
    events: SessionSender,
    current: Option<TrackHandle>,
}

#[async_trait]
impl VoiceConn for SongbirdConn {
    async fn play(&mut self, track: &TrackRef) -> Result<(), ChorusError> {
        let source = YoutubeDl::new(self.http_client.clone(), track.url.clone());
        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(source.into())
        };
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                TrackEndNotifier {
                    track: track.clone(),
                    events: self.events.clone(),
                },
            )
            .map_err(|e| ChorusError::VoiceUnavailable(e.to_string()))?;
        handle
            .add_event(
                Event::Track(TrackEvent::Error),
                TrackErrorNotifier {
                    track: track.clone(),
                    events: self.events.clone(),
                },
            )
            .map_err(|e| ChorusError::VoiceUnavailable(e.to_string()))?;
        self.current = Some(handle);
        self.events
            .notify(PlaybackEvent::TrackStarted(track.clone()));
        Ok(())
    }

    async fn pause(&mut self) {
        if let Some(handle) = &self.current {
            let _ = handle.pause();
        }
    }

    async fn resume(&mut self) {
        if let Some(handle) = &self.current {
            let _ = handle.play();
        }
    }

    async fn stop_current(&mut self) {
        // The driver still fires the track-end notifier for a stopped track;
        // queue advancement stays with the session's event handling.
        if let Some(handle) = self.current.take() {
            let _ = handle.stop();
        }
    }
}
