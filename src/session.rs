//! Per-guild playback sessions.
//!
//! Each session is an actor: one tokio task owns the voice connection, the
//! queue, and the current-track pointer, and everything that wants to touch
//! them — slash commands and backend lifecycle events alike — goes through the
//! session's mpsc channel. That makes per-guild serialization structural:
//! two handlers can never interleave mutations for the same guild because
//! only the actor mutates.

use crate::binder::NowPlayingBinder;
use crate::errors::ChorusError;
use crate::queue::PlayQueue;
use crate::track::TrackRef;
use crate::traits::{VoiceBackend, VoiceConn};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::all::{ChannelId, GuildId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle notifications from the audio backend, one tagged variant per
/// event type so the router match is exhaustive.
#[derive(Clone, Debug)]
pub enum PlaybackEvent {
    TrackStarted(TrackRef),
    TrackEnded(TrackRef),
    TrackErrored { track: TrackRef, reason: String },
    ConnectionChanged { connected: bool },
}

/// Reply to a play request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Session was idle; this track is playing now, with `queued` more behind
    /// it.
    Started { track: TrackRef, queued: usize },
    /// Already playing; the track went to the back of the queue.
    Queued { track: TrackRef, position: usize },
    /// Already playing; a batch of tracks was appended.
    QueuedMany { count: usize, queued: usize },
    /// The request resolved to nothing. Session state is untouched.
    NoTracks,
}

/// Reply to skip/pause/resume/stop. Destructive no-ops report the actual
/// outcome rather than a generic success.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlOutcome {
    Skipped(TrackRef),
    Paused,
    AlreadyPaused,
    Resumed,
    NotPaused,
    Stopped,
    NothingPlaying,
}

/// Point-in-time view of a session, for the `queue` command and tests.
#[derive(Clone, Debug)]
pub struct QueueSnapshot {
    pub current: Option<TrackRef>,
    pub paused: bool,
    pub queued: Vec<TrackRef>,
    pub display: String,
}

pub enum SessionCommand {
    Play {
        tracks: Vec<TrackRef>,
        shuffle: bool,
        text_channel: ChannelId,
        reply: oneshot::Sender<Result<PlayOutcome, ChorusError>>,
    },
    Skip {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Pause {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Resume {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Stop {
        reply: oneshot::Sender<ControlOutcome>,
    },
    Shuffle {
        reply: oneshot::Sender<usize>,
    },
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },
}

pub enum SessionMessage {
    Command(SessionCommand),
    Event(PlaybackEvent),
    Sweep { idle_after: Duration },
}

/// Handle the backend uses to report events into a session. A send to a
/// session that already ended is the stale-session outcome: dropped with a
/// debug log, never an error.
#[derive(Clone)]
pub struct SessionSender {
    guild: GuildId,
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionSender {
    pub fn notify(&self, event: PlaybackEvent) {
        if self.tx.send(SessionMessage::Event(event)).is_err() {
            debug!(target: "chorus::track", guild = %self.guild, "event for stale session dropped");
        }
    }
}

struct SessionHandle {
    generation: u64,
    voice_channel: ChannelId,
    tx: mpsc::UnboundedSender<SessionMessage>,
}

/// Registry of live sessions, one per guild at most.
pub struct PlayerSessions {
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
    backend: Arc<dyn VoiceBackend>,
    binder: Arc<NowPlayingBinder>,
    next_generation: AtomicU64,
    join_timeout: Duration,
}

impl PlayerSessions {
    #[must_use]
    pub fn new(
        backend: Arc<dyn VoiceBackend>,
        binder: Arc<NowPlayingBinder>,
        join_timeout: Duration,
    ) -> Self {
        PlayerSessions {
            sessions: Arc::new(DashMap::new()),
            backend,
            binder,
            next_generation: AtomicU64::new(0),
            join_timeout,
        }
    }

    /// Join the requester's voice channel, creating the session if absent.
    /// Returns `true` if a new session was created.
    ///
    /// # Errors
    /// `VoiceMismatch` if a session is already bound to a different channel,
    /// `JoinTimeout`/`VoiceUnavailable` if the backend can't be reached.
    pub async fn join(
        &self,
        guild: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<bool, ChorusError> {
        let (_, created) = self.ensure(guild, voice_channel, text_channel).await?;
        Ok(created)
    }

    /// Resolve-and-play entry point: if the session is idle the first track
    /// plays immediately, otherwise everything is enqueued. Never pre-empts a
    /// playing track.
    pub async fn play(
        &self,
        guild: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        tracks: Vec<TrackRef>,
        shuffle: bool,
    ) -> Result<PlayOutcome, ChorusError> {
        // One retry: the registered session can end between lookup and send,
        // in which case the first attempt hits a closed channel.
        for _ in 0..2 {
            let (tx, _) = self.ensure(guild, voice_channel, text_channel).await?;
            let (reply_tx, reply_rx) = oneshot::channel();
            let sent = tx.send(SessionMessage::Command(SessionCommand::Play {
                tracks: tracks.clone(),
                shuffle,
                text_channel,
                reply: reply_tx,
            }));
            if sent.is_err() {
                debug!(%guild, "play hit a stale session, retrying");
                continue;
            }
            match reply_rx.await {
                Ok(outcome) => return outcome,
                Err(_) => {
                    debug!(%guild, "session ended before replying to play, retrying");
                }
            }
        }
        Err(ChorusError::StaleSession)
    }

    pub async fn skip(&self, guild: GuildId) -> ControlOutcome {
        self.control(guild, |reply| SessionCommand::Skip { reply })
            .await
    }

    pub async fn pause(&self, guild: GuildId) -> ControlOutcome {
        self.control(guild, |reply| SessionCommand::Pause { reply })
            .await
    }

    pub async fn resume(&self, guild: GuildId) -> ControlOutcome {
        self.control(guild, |reply| SessionCommand::Resume { reply })
            .await
    }

    /// Unconditional disconnect. Idempotent: stopping a guild with no session
    /// reports `NothingPlaying` rather than an error.
    pub async fn stop(&self, guild: GuildId) -> ControlOutcome {
        self.control(guild, |reply| SessionCommand::Stop { reply })
            .await
    }

    /// Shuffle the queued tracks; returns how many were shuffled, or `None`
    /// when the guild has no session.
    pub async fn shuffle(&self, guild: GuildId) -> Option<usize> {
        let tx = self.sender(guild)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(SessionMessage::Command(SessionCommand::Shuffle {
            reply: reply_tx,
        }))
        .ok()?;
        reply_rx.await.ok()
    }

    pub async fn snapshot(&self, guild: GuildId) -> Option<QueueSnapshot> {
        let tx = self.sender(guild)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(SessionMessage::Command(SessionCommand::Snapshot {
            reply: reply_tx,
        }))
        .ok()?;
        reply_rx.await.ok()
    }

    /// Ask every live session to stop itself if it has been idle longer than
    /// `idle_after`. Driven by the sweeper task in `main`.
    pub fn sweep(&self, idle_after: Duration) {
        for entry in self.sessions.iter() {
            let _ = entry.tx.send(SessionMessage::Sweep { idle_after });
        }
    }

    #[must_use]
    pub fn has_session(&self, guild: GuildId) -> bool {
        self.sessions
            .get(&guild)
            .is_some_and(|h| !h.tx.is_closed())
    }

    async fn control(
        &self,
        guild: GuildId,
        make: impl FnOnce(oneshot::Sender<ControlOutcome>) -> SessionCommand,
    ) -> ControlOutcome {
        let Some(tx) = self.sender(guild) else {
            return ControlOutcome::NothingPlaying;
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        if tx.send(SessionMessage::Command(make(reply_tx))).is_err() {
            debug!(%guild, "control command for stale session discarded");
            return ControlOutcome::NothingPlaying;
        }
        reply_rx.await.unwrap_or(ControlOutcome::NothingPlaying)
    }

    fn sender(&self, guild: GuildId) -> Option<mpsc::UnboundedSender<SessionMessage>> {
        self.sessions.get(&guild).map(|h| h.tx.clone())
    }

    /// Get the live session for a guild, creating one if needed. The second
    /// element is `true` when a session was created by this call.
    async fn ensure(
        &self,
        guild: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<(mpsc::UnboundedSender<SessionMessage>, bool), ChorusError> {
        if let Some(handle) = self.sessions.get(&guild) {
            if !handle.tx.is_closed() {
                if handle.voice_channel != voice_channel {
                    return Err(ChorusError::VoiceMismatch);
                }
                return Ok((handle.tx.clone(), false));
            }
        }
        // Entry left behind by a session that ended without unregistering yet.
        self.sessions.remove_if(&guild, |_, h| h.tx.is_closed());

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = SessionSender {
            guild,
            tx: tx.clone(),
        };
        let conn = tokio::time::timeout(
            self.join_timeout,
            self.backend.connect(guild, voice_channel, sender),
        )
        .await
        .map_err(|_| ChorusError::JoinTimeout)??;

        match self.sessions.entry(guild) {
            Entry::Occupied(existing) => {
                // Lost a concurrent join for the same guild; the winner owns
                // the underlying connection, ours is dropped unused.
                if existing.get().voice_channel != voice_channel {
                    return Err(ChorusError::VoiceMismatch);
                }
                Ok((existing.get().tx.clone(), false))
            }
            Entry::Vacant(slot) => {
                slot.insert(SessionHandle {
                    generation,
                    voice_channel,
                    tx: tx.clone(),
                });
                let actor = SessionActor {
                    guild,
                    text_channel,
                    generation,
                    conn,
                    queue: PlayQueue::new(),
                    current: None,
                    paused: false,
                    autoplay: false,
                    last_activity: Instant::now(),
                    binder: Arc::clone(&self.binder),
                    backend: Arc::clone(&self.backend),
                    registry: Arc::clone(&self.sessions),
                };
                tokio::spawn(actor.run(rx));
                info!(%guild, %voice_channel, generation, "session created");
                Ok((tx, true))
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// The state a session actor owns. Dropped when the actor task finishes.
struct SessionActor {
    guild: GuildId,
    text_channel: ChannelId,
    generation: u64,
    conn: Box<dyn VoiceConn>,
    queue: PlayQueue,
    current: Option<TrackRef>,
    paused: bool,
    /// When enabled, queue advancement after a track end is left to the
    /// external node; we only clear the current-track pointer. Defaults off;
    /// no operation toggles it yet.
    autoplay: bool,
    last_activity: Instant,
    binder: Arc<NowPlayingBinder>,
    backend: Arc<dyn VoiceBackend>,
    registry: Arc<DashMap<GuildId, SessionHandle>>,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionMessage>) {
        while let Some(msg) = rx.recv().await {
            let flow = match msg {
                SessionMessage::Command(cmd) => self.handle_command(cmd).await,
                SessionMessage::Event(event) => self.handle_event(event).await,
                SessionMessage::Sweep { idle_after } => self.handle_sweep(idle_after),
            };
            if flow == Flow::Stop {
                break;
            }
        }
        // Marks the handle closed so the registry treats us as gone from here
        // on, even before the entry is removed.
        rx.close();
        self.teardown().await;
    }

    async fn handle_command(&mut self, cmd: SessionCommand) -> Flow {
        self.last_activity = Instant::now();
        match cmd {
            SessionCommand::Play {
                mut tracks,
                shuffle,
                text_channel,
                reply,
            } => {
                self.text_channel = text_channel;
                if tracks.is_empty() {
                    let _ = reply.send(Ok(PlayOutcome::NoTracks));
                    return Flow::Continue;
                }
                if self.current.is_none() {
                    let first = tracks.remove(0);
                    match self.conn.play(&first).await {
                        Ok(()) => {
                            // The remainder is queued only once the first
                            // track is actually playing; a failed request
                            // leaves the session exactly as it found it.
                            self.queue.append_vec(tracks);
                            if shuffle {
                                self.queue.shuffle();
                            }
                            self.current = Some(first.clone());
                            self.paused = false;
                            let _ = reply.send(Ok(PlayOutcome::Started {
                                track: first,
                                queued: self.queue.len(),
                            }));
                        }
                        // Session stays connected and idle; nothing is torn
                        // down speculatively.
                        Err(e) => {
                            let _ = reply.send(Err(e));
                        }
                    }
                } else {
                    let count = tracks.len();
                    let single = match &tracks[..] {
                        [only] => Some(only.clone()),
                        _ => None,
                    };
                    self.queue.append_vec(tracks);
                    if shuffle {
                        self.queue.shuffle();
                    }
                    let outcome = match single {
                        Some(track) => PlayOutcome::Queued {
                            track,
                            position: self.queue.len(),
                        },
                        None => PlayOutcome::QueuedMany {
                            count,
                            queued: self.queue.len(),
                        },
                    };
                    let _ = reply.send(Ok(outcome));
                }
                Flow::Continue
            }
            SessionCommand::Skip { reply } => {
                match self.current.clone() {
                    Some(track) => {
                        // Advancement happens when the backend reports the
                        // forced track end.
                        self.conn.stop_current().await;
                        let _ = reply.send(ControlOutcome::Skipped(track));
                    }
                    None => {
                        let _ = reply.send(ControlOutcome::NothingPlaying);
                    }
                }
                Flow::Continue
            }
            SessionCommand::Pause { reply } => {
                let outcome = if self.current.is_none() {
                    ControlOutcome::NothingPlaying
                } else if self.paused {
                    ControlOutcome::AlreadyPaused
                } else {
                    self.conn.pause().await;
                    self.paused = true;
                    ControlOutcome::Paused
                };
                let _ = reply.send(outcome);
                Flow::Continue
            }
            SessionCommand::Resume { reply } => {
                let outcome = if self.current.is_none() {
                    ControlOutcome::NothingPlaying
                } else if !self.paused {
                    ControlOutcome::NotPaused
                } else {
                    self.conn.resume().await;
                    self.paused = false;
                    ControlOutcome::Resumed
                };
                let _ = reply.send(outcome);
                Flow::Continue
            }
            SessionCommand::Stop { reply } => {
                let _ = reply.send(ControlOutcome::Stopped);
                Flow::Stop
            }
            SessionCommand::Shuffle { reply } => {
                self.queue.shuffle();
                let _ = reply.send(self.queue.len());
                Flow::Continue
            }
            SessionCommand::Snapshot { reply } => {
                self.queue.build_display(self.current.as_ref());
                let _ = reply.send(QueueSnapshot {
                    current: self.current.clone(),
                    paused: self.paused,
                    queued: self.queue.tracks(),
                    display: self.queue.get_display(),
                });
                Flow::Continue
            }
        }
    }

    async fn handle_event(&mut self, event: PlaybackEvent) -> Flow {
        self.last_activity = Instant::now();
        match event {
            PlaybackEvent::TrackStarted(track) => {
                if self.current.as_ref().map(|c| &c.url) != Some(&track.url) {
                    debug!(guild = %self.guild, track = %track.title, "stale track-start ignored");
                    return Flow::Continue;
                }
                info!(target: "chorus::track", guild = %self.guild, track = %track.title, "track started");
                let content = self.render_status(&track);
                self.binder
                    .announce(self.guild, self.text_channel, content)
                    .await;
                Flow::Continue
            }
            PlaybackEvent::TrackEnded(ended) => {
                if self.current.as_ref().map(|c| &c.url) != Some(&ended.url) {
                    debug!(guild = %self.guild, track = %ended.title, "stale track-end ignored");
                    return Flow::Continue;
                }
                self.current = None;
                if self.autoplay {
                    return Flow::Continue;
                }
                self.advance().await
            }
            PlaybackEvent::TrackErrored { track, reason } => {
                warn!(guild = %self.guild, track = %track.title, %reason, "track errored");
                self.binder
                    .notice(
                        self.guild,
                        self.text_channel,
                        format!("Error playing {}, skipping ahead.", track.title),
                    )
                    .await;
                if self.current.as_ref().map(|c| &c.url) == Some(&track.url) {
                    self.current = None;
                    self.advance().await
                } else {
                    Flow::Continue
                }
            }
            PlaybackEvent::ConnectionChanged { connected } => {
                if connected {
                    Flow::Continue
                } else {
                    info!(guild = %self.guild, "voice connection dropped by backend");
                    Flow::Stop
                }
            }
        }
    }

    fn handle_sweep(&mut self, idle_after: Duration) -> Flow {
        if idle_after.is_zero() || self.current.is_some() {
            return Flow::Continue;
        }
        if self.last_activity.elapsed() >= idle_after {
            info!(guild = %self.guild, "stopping idle session");
            return Flow::Stop;
        }
        Flow::Continue
    }

    /// Pop and start the next track. Tracks that fail to start are reported
    /// and skipped. An exhausted queue ends the session.
    async fn advance(&mut self) -> Flow {
        while let Some(next) = self.queue.pop_front() {
            match self.conn.play(&next).await {
                Ok(()) => {
                    self.current = Some(next);
                    self.paused = false;
                    return Flow::Continue;
                }
                Err(e) => {
                    warn!(guild = %self.guild, track = %next.title, error = %e, "failed to start track");
                    self.binder
                        .notice(
                            self.guild,
                            self.text_channel,
                            format!("Couldn't start {}, skipping it.", next.title),
                        )
                        .await;
                }
            }
        }
        Flow::Stop
    }

    fn render_status(&self, current: &TrackRef) -> String {
        match self.queue.peek_front() {
            Some(next) => format!(
                "Now playing: {current}\nUp next: {next} ({} queued)",
                self.queue.len()
            ),
            None => format!("Now playing: {current}"),
        }
    }

    async fn teardown(mut self) {
        let still_registered = self
            .registry
            .remove_if(&self.guild, |_, h| h.generation == self.generation)
            .is_some();
        if !still_registered {
            // A newer session took over the guild while we were winding down;
            // the voice connection and binding belong to it now.
            debug!(guild = %self.guild, generation = self.generation, "superseded session ended");
            return;
        }
        self.conn.stop_current().await;
        self.backend.disconnect(self.guild).await;
        self.binder.clear(self.guild).await;
        info!(guild = %self.guild, generation = self.generation, "session ended");
    }
}
