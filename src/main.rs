use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use poise::serenity_prelude as serenity;
use serenity::{async_trait, http::Http, model::gateway::Ready, prelude::GatewayIntents};
use tracing::{error, info, warn};

use chorus::binder::{NowPlayingBinder, SerenityChat};
use chorus::commands;
use chorus::config::{Cli, Config};
use chorus::logging;
use chorus::resolve::YtSearch;
use chorus::session::PlayerSessions;
use chorus::voice::SongbirdBackend;
use chorus::{Data, Error, REQ_CLIENT};

struct Handler;

#[async_trait]
impl serenity::EventHandler for Handler {
    async fn ready(&self, _: serenity::Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    logging::log_command_error(&error).await;
    if let poise::FrameworkError::Command { error, ctx, .. } = error {
        if let Err(e) = ctx.say(error.user_message()).await {
            warn!(error = %e, "failed to send error reply");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init().map_err(|e| anyhow::anyhow!("logging init failed: {e}"))?;
    let config = Config::load(cli)?;

    let intents = GatewayIntents::non_privileged() | GatewayIntents::MESSAGE_CONTENT;
    let manager = songbird::Songbird::serenity();

    let http = Arc::new(Http::new(&config.token));
    let binder = Arc::new(NowPlayingBinder::new(Arc::new(SerenityChat::new(http))));
    let backend = Arc::new(SongbirdBackend::new(
        Arc::clone(&manager),
        REQ_CLIENT.clone(),
    ));
    let sessions = Arc::new(PlayerSessions::new(backend, binder, config.join_timeout));
    let search = Arc::new(YtSearch::new(REQ_CLIENT.clone())?);

    let data = Data {
        sessions: Arc::clone(&sessions),
        search,
        config: config.clone(),
    };

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::command_list(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(config.prefix.clone()),
                ..Default::default()
            },
            pre_command: |ctx| Box::pin(logging::log_command_start(ctx)),
            post_command: |ctx| Box::pin(logging::log_command_end(ctx)),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.token, intents)
        .event_handler(Handler)
        .framework(framework)
        .voice_manager_arc(manager)
        .await?;

    // Sweeper task: periodically asks every session to tear itself down if
    // idle. Owned here so shutdown can stop it cleanly.
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper = {
        let sessions = Arc::clone(&sessions);
        let idle_timeout = config.idle_timeout;
        tokio::spawn(async move {
            if idle_timeout.is_zero() {
                return;
            }
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = interval.tick() => sessions.sweep(idle_timeout),
                    _ = shutdown_rx.changed() => break,
                }
            }
        })
    };

    let shard_manager = client.shard_manager.clone();
    tokio::select! {
        result = client.start() => {
            if let Err(why) = result {
                error!(error = %why, "client ended");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
            shard_manager.shutdown_all().await;
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;

    Ok(())
}
