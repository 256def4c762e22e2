use crate::binder::NowPlayingBinder;
use crate::errors::ChorusError;
use crate::session::{ControlOutcome, PlaybackEvent, PlayOutcome, PlayerSessions};
use crate::test::fakes::{track, FakeChat, FakeVoice, FakeVoiceState};
use crate::traits::ChatTransport;

use serenity::all::{ChannelId, GuildId};
use std::sync::Arc;
use std::time::Duration;

const GUILD: GuildId = GuildId::new(1);
const VOICE: ChannelId = ChannelId::new(10);
const OTHER_VOICE: ChannelId = ChannelId::new(11);
const TEXT: ChannelId = ChannelId::new(20);

fn setup() -> (Arc<PlayerSessions>, Arc<FakeVoiceState>, Arc<FakeChat>) {
    let (voice, state) = FakeVoice::new();
    let chat = FakeChat::new();
    let binder = Arc::new(NowPlayingBinder::new(
        Arc::clone(&chat) as Arc<dyn ChatTransport>
    ));
    let sessions = Arc::new(PlayerSessions::new(
        Arc::new(voice),
        binder,
        Duration::from_secs(5),
    ));
    (sessions, state, chat)
}

/// Barrier: a snapshot reply proves the actor has processed every message
/// sent before it, including self-notified playback events.
async fn settle(sessions: &PlayerSessions) {
    let _ = sessions.snapshot(GUILD).await;
}

/// Poll for a condition that is satisfied by the actor's teardown, which has
/// no reply to await on.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn test_play_starts_idle_session() {
    let (sessions, state, chat) = setup();

    let outcome = sessions
        .play(GUILD, VOICE, TEXT, vec![track(1)], false)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PlayOutcome::Started {
            track: track(1),
            queued: 0
        }
    );

    settle(&sessions).await;
    assert_eq!(state.played_titles(), vec!["Track 1"]);
    assert_eq!(state.connects.lock().unwrap().as_slice(), &[(GUILD, VOICE)]);
    let sent = chat.sent_contents();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Now playing: Track 1"));
}

#[tokio::test]
async fn test_play_while_playing_enqueues() {
    let (sessions, state, _chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1)], false)
        .await
        .unwrap();
    let outcome = sessions
        .play(GUILD, VOICE, TEXT, vec![track(2)], false)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PlayOutcome::Queued {
            track: track(2),
            position: 1
        }
    );

    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.current, Some(track(1)));
    assert_eq!(snapshot.queued, vec![track(2)]);
    // Only the first track actually started.
    assert_eq!(state.played_titles(), vec!["Track 1"]);
}

#[tokio::test]
async fn test_playlist_starts_first_and_queues_rest() {
    let (sessions, _state, chat) = setup();

    let outcome = sessions
        .play(GUILD, VOICE, TEXT, vec![track(1), track(2), track(3)], false)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PlayOutcome::Started {
            track: track(1),
            queued: 2
        }
    );

    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.current, Some(track(1)));
    assert_eq!(snapshot.queued.len(), 2);
    let sent = chat.sent_contents();
    assert!(sent[0].contains("Up next: Track 2"));
}

#[tokio::test]
async fn test_empty_play_request_leaves_session_idle() {
    let (sessions, state, _chat) = setup();

    let outcome = sessions
        .play(GUILD, VOICE, TEXT, Vec::new(), false)
        .await
        .unwrap();
    assert_eq!(outcome, PlayOutcome::NoTracks);

    // Connected but idle. Nothing played, nothing announced.
    assert!(sessions.has_session(GUILD));
    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.current, None);
    assert!(state.played.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_pause_resume_state_machine() {
    let (sessions, state, _chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1)], false)
        .await
        .unwrap();

    assert_eq!(sessions.pause(GUILD).await, ControlOutcome::Paused);
    assert_eq!(sessions.pause(GUILD).await, ControlOutcome::AlreadyPaused);
    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert!(snapshot.paused);

    assert_eq!(sessions.resume(GUILD).await, ControlOutcome::Resumed);
    assert_eq!(sessions.resume(GUILD).await, ControlOutcome::NotPaused);
    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert!(!snapshot.paused);

    // The backend saw exactly one pause and one resume.
    assert_eq!(state.ops.lock().unwrap().as_slice(), &["pause", "resume"]);
}

#[tokio::test]
async fn test_pause_with_nothing_playing() {
    let (sessions, _state, _chat) = setup();

    sessions.join(GUILD, VOICE, TEXT).await.unwrap();
    assert_eq!(sessions.pause(GUILD).await, ControlOutcome::NothingPlaying);
    assert_eq!(sessions.resume(GUILD).await, ControlOutcome::NothingPlaying);
}

#[tokio::test]
async fn test_skip_advances_to_next_track() {
    let (sessions, state, chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1), track(2)], false)
        .await
        .unwrap();

    let outcome = sessions.skip(GUILD).await;
    assert_eq!(outcome, ControlOutcome::Skipped(track(1)));

    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.current, Some(track(2)));
    assert!(snapshot.queued.is_empty());
    assert_eq!(state.played_titles(), vec!["Track 1", "Track 2"]);

    // The status message was posted once, then edited in place.
    assert_eq!(chat.sent_contents().len(), 1);
    let edits = chat.edits.lock().unwrap();
    assert_eq!(edits.len(), 1);
    assert!(edits[0].1.contains("Now playing: Track 2"));
}

#[tokio::test]
async fn test_skip_with_nothing_playing() {
    let (sessions, _state, _chat) = setup();

    sessions.join(GUILD, VOICE, TEXT).await.unwrap();
    assert_eq!(sessions.skip(GUILD).await, ControlOutcome::NothingPlaying);
    // No session at all reports the same.
    assert_eq!(
        sessions.skip(GuildId::new(2)).await,
        ControlOutcome::NothingPlaying
    );
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (sessions, state, chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1)], false)
        .await
        .unwrap();
    settle(&sessions).await;

    assert_eq!(sessions.stop(GUILD).await, ControlOutcome::Stopped);
    wait_until(|| !sessions.has_session(GUILD)).await;
    wait_until(|| state.disconnects.lock().unwrap().len() == 1).await;
    wait_until(|| chat.deletes.lock().unwrap().len() == 1).await;

    // Second stop against the gone session is a clean no-op.
    assert_eq!(sessions.stop(GUILD).await, ControlOutcome::NothingPlaying);
    assert_eq!(state.disconnects.lock().unwrap().len(), 1);
    assert_eq!(chat.deletes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_queue_exhaustion_ends_session() {
    let (sessions, state, chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1), track(2)], false)
        .await
        .unwrap();
    settle(&sessions).await;

    state.end_current();
    settle(&sessions).await;
    assert_eq!(state.played_titles(), vec!["Track 1", "Track 2"]);

    // Last track ends with nothing queued: disconnect and clear the message.
    state.end_current();
    wait_until(|| !sessions.has_session(GUILD)).await;
    wait_until(|| state.disconnects.lock().unwrap().len() == 1).await;
    wait_until(|| chat.deletes.lock().unwrap().len() == 1).await;
}

#[tokio::test]
async fn test_play_racing_track_end_converges() {
    let (sessions, state, _chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1), track(2)], false)
        .await
        .unwrap();
    settle(&sessions).await;

    // Track 1 ends while a new play request is in flight. Whichever message
    // the actor sees first, it converges to track 2 playing with track 3
    // queued behind it.
    state.end_current();
    let outcome = sessions
        .play(GUILD, VOICE, TEXT, vec![track(3)], false)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PlayOutcome::Queued { .. } | PlayOutcome::Started { .. }
    ));

    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.current, Some(track(2)));
    assert_eq!(snapshot.queued, vec![track(3)]);
    assert_eq!(state.played_titles(), vec!["Track 1", "Track 2"]);
}

#[tokio::test]
async fn test_stale_track_end_is_ignored() {
    let (sessions, state, _chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1)], false)
        .await
        .unwrap();
    settle(&sessions).await;

    // An end report for a track that is not current must not advance or
    // tear anything down.
    state.send(PlaybackEvent::TrackEnded(track(99)));
    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.current, Some(track(1)));
    assert!(sessions.has_session(GUILD));
    assert!(state.disconnects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_connection_drop_ends_session() {
    let (sessions, state, _chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1)], false)
        .await
        .unwrap();
    settle(&sessions).await;

    state.send(PlaybackEvent::ConnectionChanged { connected: false });
    wait_until(|| !sessions.has_session(GUILD)).await;
    wait_until(|| state.disconnects.lock().unwrap().len() == 1).await;
}

#[tokio::test]
async fn test_play_from_other_channel_is_rejected() {
    let (sessions, _state, _chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1)], false)
        .await
        .unwrap();

    let err = sessions
        .play(GUILD, OTHER_VOICE, TEXT, vec![track(2)], false)
        .await
        .unwrap_err();
    assert!(matches!(err, ChorusError::VoiceMismatch));

    // The original session is untouched.
    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.current, Some(track(1)));
}

#[tokio::test]
async fn test_track_error_advances_and_notifies() {
    let (sessions, state, chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1), track(2)], false)
        .await
        .unwrap();
    settle(&sessions).await;

    state.send(PlaybackEvent::TrackErrored {
        track: track(1),
        reason: "decode failed".into(),
    });

    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.current, Some(track(2)));
    let sent = chat.sent_contents();
    assert!(sent.iter().any(|c| c.contains("Error playing Track 1")));
}

#[tokio::test]
async fn test_play_failure_leaves_session_idle() {
    let (sessions, state, _chat) = setup();

    state.fail_next_play.store(true, std::sync::atomic::Ordering::SeqCst);
    let err = sessions
        .play(GUILD, VOICE, TEXT, vec![track(1)], false)
        .await
        .unwrap_err();
    assert!(matches!(err, ChorusError::VoiceUnavailable(_)));

    // Still connected; a later play works.
    assert!(sessions.has_session(GUILD));
    let outcome = sessions
        .play(GUILD, VOICE, TEXT, vec![track(2)], false)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PlayOutcome::Started {
            track: track(2),
            queued: 0
        }
    );
}

#[tokio::test]
async fn test_play_failure_queues_nothing() {
    let (sessions, state, _chat) = setup();

    // First track of a batch fails to start: the rest must not linger in the
    // queue behind an error reply.
    state
        .fail_next_play
        .store(true, std::sync::atomic::Ordering::SeqCst);
    let err = sessions
        .play(GUILD, VOICE, TEXT, vec![track(1), track(2), track(3)], false)
        .await
        .unwrap_err();
    assert!(matches!(err, ChorusError::VoiceUnavailable(_)));

    let snapshot = sessions.snapshot(GUILD).await.unwrap();
    assert_eq!(snapshot.current, None);
    assert!(snapshot.queued.is_empty());
    assert!(state.played.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_join_reports_creation_once() {
    let (sessions, state, _chat) = setup();

    assert!(sessions.join(GUILD, VOICE, TEXT).await.unwrap());
    assert!(!sessions.join(GUILD, VOICE, TEXT).await.unwrap());
    assert_eq!(state.connects.lock().unwrap().len(), 1);

    let err = sessions.join(GUILD, OTHER_VOICE, TEXT).await.unwrap_err();
    assert!(matches!(err, ChorusError::VoiceMismatch));
}

#[tokio::test]
async fn test_sweep_ends_idle_session() {
    let (sessions, state, _chat) = setup();

    sessions.join(GUILD, VOICE, TEXT).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    sessions.sweep(Duration::from_millis(5));
    wait_until(|| !sessions.has_session(GUILD)).await;
    wait_until(|| state.disconnects.lock().unwrap().len() == 1).await;
}

#[tokio::test]
async fn test_sweep_spares_playing_session() {
    let (sessions, _state, _chat) = setup();

    sessions
        .play(GUILD, VOICE, TEXT, vec![track(1)], false)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    sessions.sweep(Duration::from_millis(5));
    settle(&sessions).await;
    assert!(sessions.has_session(GUILD));
}

#[tokio::test]
async fn test_shuffle_reports_queue_size() {
    let (sessions, _state, _chat) = setup();

    sessions
        .play(
            GUILD,
            VOICE,
            TEXT,
            vec![track(1), track(2), track(3), track(4)],
            false,
        )
        .await
        .unwrap();

    assert_eq!(sessions.shuffle(GUILD).await, Some(3));
    assert_eq!(sessions.shuffle(GuildId::new(2)).await, None);
}
