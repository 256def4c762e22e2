pub mod binder;
pub mod commands;
pub mod config;
pub mod errors;
pub mod event_handlers;
pub mod logging;
pub mod queue;
pub mod resolve;
pub mod session;
pub mod track;
pub mod traits;
pub mod voice;

#[cfg(test)]
pub mod test;

pub use binder::NowPlayingBinder;
pub use config::Config;
pub use errors::ChorusError;
pub use queue::PlayQueue;
pub use session::PlayerSessions;
pub use track::{SearchOutcome, TrackRef};

use std::sync::{Arc, LazyLock};

pub const CREATING: &str = "Creating";
pub const NEW_FAILED: &str = "New failed";
pub const REQ_CLIENT_STR: &str = "Reqwest client";

/// Shared HTTP client. One instance for the whole process; the search and
/// streaming layers clone it, so connection pools and cookies are shared.
pub static REQ_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    println!("{CREATING}: {REQ_CLIENT_STR}...");
    build_configured_reqwest_client()
});

/// Build a configured reqwest client for the search and streaming layers.
///
/// # Panics
/// Panics if the reqwest client cannot be built.
#[must_use]
pub fn build_configured_reqwest_client() -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .cookie_store(true)
        .build()
        .unwrap_or_else(|_| panic!("{NEW_FAILED} {REQ_CLIENT_STR}"))
}

/// The data structure available in all command contexts.
pub struct Data {
    pub sessions: Arc<PlayerSessions>,
    pub search: Arc<dyn traits::TrackSearch>,
    pub config: Config,
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub type Error = ChorusError;
pub type Context<'a> = poise::Context<'a, Data, Error>;
