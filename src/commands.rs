//! Chat command surface. Each command resolves the caller's guild and voice
//! channel, then delegates to the per-guild session layer; replies are
//! formatted here so the session layer never touches Discord messages
//! directly.

use crate::errors::ChorusError;
use crate::session::{ControlOutcome, PlayOutcome, QueueSnapshot};
use crate::track::SearchOutcome;
use crate::{Context, Data, Error};

use serenity::all::{ChannelId, GuildId};
use tracing::info;

/// Resolve the invoking user's guild and current voice channel.
///
/// Uses the serenity cache; both errors map onto user-facing replies.
fn guild_and_voice(ctx: Context<'_>) -> Result<(GuildId, ChannelId), ChorusError> {
    let (guild_id, channel) = {
        let guild = ctx.guild().ok_or(ChorusError::NotInVoiceChannel)?;
        let channel = guild
            .voice_states
            .get(&ctx.author().id)
            .and_then(|vs| vs.channel_id);
        (guild.id, channel)
    };
    let channel = channel.ok_or(ChorusError::NotInVoiceChannel)?;
    Ok((guild_id, channel))
}

async fn reply(ctx: Context<'_>, content: impl Into<String>) -> Result<(), Error> {
    ctx.say(content.into()).await?;
    Ok(())
}

fn describe_play(outcome: &PlayOutcome) -> String {
    match outcome {
        PlayOutcome::Started { track, queued: 0 } => format!("Playing **{track}**"),
        PlayOutcome::Started { track, queued } => {
            format!("Playing **{track}** ({queued} more queued)")
        }
        PlayOutcome::Queued { track, position } => {
            format!("Queued **{track}** at position {position}")
        }
        PlayOutcome::QueuedMany { count, queued } => {
            format!("Queued {count} tracks ({queued} total waiting)")
        }
        PlayOutcome::NoTracks => ChorusError::NoTracksFound.user_message(),
    }
}

fn describe_queue(snapshot: Option<QueueSnapshot>) -> String {
    match snapshot {
        Some(snapshot) => snapshot.display,
        None => "Nothing is playing.".to_string(),
    }
}

fn describe_shuffle(count: Option<usize>) -> String {
    match count {
        Some(count) => format!("Shuffled {count} tracks."),
        None => "Nothing is queued.".to_string(),
    }
}

fn describe_control(outcome: &ControlOutcome) -> String {
    match outcome {
        ControlOutcome::Skipped(track) => format!("Skipped **{track}**"),
        ControlOutcome::Paused => "Paused.".to_string(),
        ControlOutcome::AlreadyPaused => "Already paused.".to_string(),
        ControlOutcome::Resumed => "Resumed.".to_string(),
        ControlOutcome::NotPaused => "Nothing is paused.".to_string(),
        ControlOutcome::Stopped => "Stopped and left the voice channel.".to_string(),
        ControlOutcome::NothingPlaying => "Nothing is playing.".to_string(),
    }
}

/// Join the caller's voice channel without starting playback.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn join(ctx: Context<'_>) -> Result<(), Error> {
    let (guild, channel) = guild_and_voice(ctx)?;
    let created = ctx
        .data()
        .sessions
        .join(guild, channel, ctx.channel_id())
        .await?;
    if created {
        reply(ctx, "Joined your voice channel.").await
    } else {
        reply(ctx, "Already connected.").await
    }
}

/// Play a track from a URL or search query.
#[poise::command(slash_command, prefix_command, guild_only, aliases("p"))]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search terms"]
    #[rest]
    query: String,
) -> Result<(), Error> {
    let (guild, channel) = guild_and_voice(ctx)?;
    ctx.defer().await?;
    let data = ctx.data();
    let outcome = tokio::time::timeout(data.config.search_timeout, data.search.search(&query))
        .await
        .map_err(|_| ChorusError::SearchTimeout)??;
    let tracks = match outcome {
        SearchOutcome::Tracks(tracks) => tracks.into_iter().take(1).collect::<Vec<_>>(),
        SearchOutcome::Playlist { tracks, .. } => tracks,
    };
    if tracks.is_empty() {
        return Err(ChorusError::NoTracksFound);
    }
    info!(target: "chorus::command", %guild, %query, count = tracks.len(), "play request resolved");
    let outcome = data
        .sessions
        .play(guild, channel, ctx.channel_id(), tracks, false)
        .await?;
    reply(ctx, describe_play(&outcome)).await
}

/// Queue every track of a playlist, optionally shuffled.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn playlist(
    ctx: Context<'_>,
    #[flag] shuffle: bool,
    #[description = "Playlist URL"]
    #[rest]
    url: String,
) -> Result<(), Error> {
    let (guild, channel) = guild_and_voice(ctx)?;
    let processing = ctx.say("Fetching playlist...").await?;
    let data = ctx.data();
    let outcome = tokio::time::timeout(data.config.search_timeout, data.search.search(&url))
        .await
        .map_err(|_| ChorusError::SearchTimeout)??;
    let (name, tracks) = match outcome {
        SearchOutcome::Playlist { name, tracks } => (Some(name), tracks),
        SearchOutcome::Tracks(tracks) => (None, tracks),
    };
    if tracks.is_empty() {
        return Err(ChorusError::NoTracksFound);
    }
    info!(target: "chorus::command", %guild, %url, count = tracks.len(), "playlist resolved");
    let outcome = data
        .sessions
        .play(guild, channel, ctx.channel_id(), tracks, shuffle)
        .await?;
    let mut content = describe_play(&outcome);
    if let Some(name) = name {
        content = format!("**{name}**: {content}");
    }
    processing
        .edit(ctx, poise::CreateReply::default().content(content))
        .await?;
    Ok(())
}

/// Skip the currently playing track.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let (guild, _) = guild_and_voice(ctx)?;
    let outcome = ctx.data().sessions.skip(guild).await;
    reply(ctx, describe_control(&outcome)).await
}

/// Pause playback.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn pause(ctx: Context<'_>) -> Result<(), Error> {
    let (guild, _) = guild_and_voice(ctx)?;
    let outcome = ctx.data().sessions.pause(guild).await;
    reply(ctx, describe_control(&outcome)).await
}

/// Resume paused playback.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let (guild, _) = guild_and_voice(ctx)?;
    let outcome = ctx.data().sessions.resume(guild).await;
    reply(ctx, describe_control(&outcome)).await
}

/// Stop playback, clear the queue, and leave the voice channel.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    let (guild, _) = guild_and_voice(ctx)?;
    let outcome = ctx.data().sessions.stop(guild).await;
    reply(ctx, describe_control(&outcome)).await
}

/// Show the current queue.
#[poise::command(slash_command, prefix_command, guild_only, aliases("q"))]
pub async fn queue(ctx: Context<'_>) -> Result<(), Error> {
    let (guild, _) = guild_and_voice(ctx)?;
    let snapshot = ctx.data().sessions.snapshot(guild).await;
    reply(ctx, describe_queue(snapshot)).await
}

/// Shuffle the queued tracks. The current track keeps playing.
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn shuffle(ctx: Context<'_>) -> Result<(), Error> {
    let (guild, _) = guild_and_voice(ctx)?;
    let count = ctx.data().sessions.shuffle(guild).await;
    reply(ctx, describe_shuffle(count)).await
}

/// Liveness check.
#[poise::command(slash_command, prefix_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    reply(ctx, "Pong!").await
}

pub fn command_list() -> Vec<poise::Command<Data, Error>> {
    vec![
        join(),
        play(),
        playlist(),
        skip(),
        pause(),
        resume(),
        stop(),
        queue(),
        shuffle(),
        ping(),
    ]
}
