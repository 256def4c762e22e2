use crate::{Context, Data, Error};
use poise::FrameworkError;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::FilterFn;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    prelude::*,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log directory name
pub const LOG_DIR: &str = "logs";
/// Command log file name
pub const COMMAND_LOG_FILE: &str = "commands";
/// Track log file name
pub const TRACK_LOG_FILE: &str = "tracks";
/// Error log file name
pub const ERROR_LOG_FILE: &str = "errors";

/// Initialize the logging system with console and file outputs.
///
/// Console gets human-readable output; commands, track lifecycle events, and
/// errors each get a daily-rotated JSON file keyed off their log target.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !Path::new(LOG_DIR).exists() {
        std::fs::create_dir_all(LOG_DIR)?;
    }

    let command_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, COMMAND_LOG_FILE);
    let track_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, TRACK_LOG_FILE);
    let error_file = RollingFileAppender::new(Rotation::DAILY, LOG_DIR, ERROR_LOG_FILE);

    let console_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(true);

    let command_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(command_file)
        .with_filter(FilterFn::new(|metadata| {
            metadata.target() == "chorus::command"
        }));

    let track_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(track_file)
        .with_filter(FilterFn::new(|metadata| {
            metadata.target() == "chorus::track"
        }));

    let error_layer = fmt::layer()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_ansi(false)
        .json()
        .with_writer(error_file)
        .with_filter(FilterFn::new(|metadata| {
            metadata.target().starts_with("chorus")
                && *metadata.level() == tracing::Level::ERROR
        }));

    // Default to INFO but allow runtime override via RUST_LOG; the serenity
    // heartbeat logs drown everything else at INFO.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info").add_directive("serenity=error".parse().unwrap())
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(command_layer)
        .with(track_layer)
        .with(error_layer)
        .init();

    info!("Logging system initialized");
    Ok(())
}

/// Log the start of a command execution (pre-command hook).
pub async fn log_command_start(ctx: Context<'_>) {
    // Stash the start time in the invocation data so post_command can
    // compute the duration for this specific invocation.
    ctx.set_invocation_data(Instant::now()).await;

    let command_name = ctx.command().qualified_name.clone();
    let guild_id = ctx
        .guild_id()
        .map(|id| id.get().to_string())
        .unwrap_or_else(|| "DM".to_string());
    let user_id = ctx.author().id.get().to_string();

    info!(
        target: "chorus::command",
        command = %command_name,
        guild_id = %guild_id,
        user_id = %user_id,
        invocation = %ctx.invocation_string(),
        event = "start",
        "Command execution started"
    );
}

/// Log the end of a command execution (post-command hook).
pub async fn log_command_end(ctx: Context<'_>) {
    let duration_ms = match ctx.invocation_data::<Instant>().await {
        Some(start) => start.elapsed().as_millis() as u64,
        None => 0,
    };

    let command_name = ctx.command().qualified_name.clone();
    let guild_id = ctx
        .guild_id()
        .map(|id| id.get().to_string())
        .unwrap_or_else(|| "DM".to_string());
    let user_id = ctx.author().id.get().to_string();

    info!(
        target: "chorus::command",
        command = %command_name,
        guild_id = %guild_id,
        user_id = %user_id,
        duration_ms,
        event = "end",
        "Command execution completed"
    );
}

/// Log errors that occur during command execution.
pub async fn log_command_error(error: &FrameworkError<'_, Data, Error>) {
    match error {
        FrameworkError::Command { error, ctx, .. } => {
            let command_name = ctx.command().qualified_name.clone();
            let guild_id = ctx
                .guild_id()
                .map(|id| id.get().to_string())
                .unwrap_or_else(|| "DM".to_string());
            let user_id = ctx.author().id.get().to_string();

            error!(
                target: "chorus::error",
                command = %command_name,
                guild_id = %guild_id,
                user_id = %user_id,
                error = %error,
                "Command error"
            );
        }
        FrameworkError::CommandCheckFailed { error, ctx, .. } => {
            let command_name = ctx.command().qualified_name.clone();
            let error_msg = error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Check failed".to_string());

            error!(
                target: "chorus::error",
                command = %command_name,
                error = %error_msg,
                "Command check failed"
            );
        }
        err => {
            error!(
                target: "chorus::error",
                error = ?err,
                "Other framework error"
            );
        }
    }
}
