use anyhow::Context as _;
use clap::Parser;
use std::time::Duration;

/// Default chat prefix for text commands.
pub const DEFAULT_PREFIX: &str = "~";
/// Idle seconds before an unused voice session is torn down.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
/// Upper bound on any single Discord voice or search call.
pub const EXTERNAL_CALL_TIMEOUT_SECS: u64 = 15;

#[derive(Parser, Debug)]
#[command(name = "chorus", about = "Discord music bot", version)]
pub struct Cli {
    /// Chat prefix for text commands
    #[arg(long)]
    pub prefix: Option<String>,
    /// Seconds of inactivity before leaving a voice channel (0 disables)
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub prefix: String,
    pub idle_timeout: Duration,
    pub join_timeout: Duration,
    pub search_timeout: Duration,
}

impl Config {
    /// Build the runtime configuration. CLI flags win over environment
    /// variables, which win over defaults. The bot token has no default.
    pub fn load(cli: Cli) -> anyhow::Result<Config> {
        let token = std::env::var("DISCORD_TOKEN")
            .context("DISCORD_TOKEN must be set to the bot token")?;
        let prefix = cli
            .prefix
            .or_else(|| std::env::var("CHORUS_PREFIX").ok())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        let idle_secs = match cli.idle_timeout_secs {
            Some(secs) => secs,
            None => match std::env::var("CHORUS_IDLE_TIMEOUT_SECS") {
                Ok(raw) => raw
                    .parse::<u64>()
                    .context("CHORUS_IDLE_TIMEOUT_SECS must be an integer")?,
                Err(_) => DEFAULT_IDLE_TIMEOUT_SECS,
            },
        };
        Ok(Config {
            token,
            prefix,
            idle_timeout: Duration::from_secs(idle_secs),
            join_timeout: Duration::from_secs(EXTERNAL_CALL_TIMEOUT_SECS),
            search_timeout: Duration::from_secs(EXTERNAL_CALL_TIMEOUT_SECS),
        })
    }
}
