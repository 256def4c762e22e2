//! Now-playing message binder: keeps exactly one live status message per
//! guild in sync with playback.

use crate::errors::ChorusError;
use crate::traits::ChatTransport;

use async_trait::async_trait;
use dashmap::DashMap;
use serenity::all::{ChannelId, GuildId, MessageId};
use serenity::builder::{CreateMessage, EditMessage};
use serenity::http::Http;
use std::sync::Arc;
use tracing::{debug, warn};

/// The guild's live status message: where it is and which message it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub channel: ChannelId,
    pub message: MessageId,
}

/// Maps guild -> bound status message. Process-memory only; a restart loses
/// bindings along with the in-flight sessions they belong to.
pub struct NowPlayingBinder {
    transport: Arc<dyn ChatTransport>,
    bindings: DashMap<GuildId, Binding>,
}

impl NowPlayingBinder {
    #[must_use]
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        NowPlayingBinder {
            transport,
            bindings: DashMap::new(),
        }
    }

    /// Post the status message on first call for a guild, edit the same
    /// message in place on every later call.
    ///
    /// An edit failure (message deleted externally) is logged and the binding
    /// kept: updates simply stop until playback fully restarts for the guild.
    /// Message recovery is an explicit non-goal.
    pub async fn announce(&self, guild: GuildId, channel: ChannelId, content: String) {
        let bound = self.bindings.get(&guild).map(|b| *b.value());
        match bound {
            Some(binding) => {
                if let Err(e) = self
                    .transport
                    .edit(binding.channel, binding.message, content)
                    .await
                {
                    warn!(%guild, error = %e, "failed to update now-playing message");
                }
            }
            None => match self.transport.send(channel, content).await {
                Ok(message) => {
                    self.bindings.insert(guild, Binding { channel, message });
                }
                Err(e) => {
                    warn!(%guild, error = %e, "failed to post now-playing message");
                }
            },
        }
    }

    /// Delete the bound message and drop the binding. A delete failure means
    /// the message is already gone, which is the state we wanted.
    pub async fn clear(&self, guild: GuildId) {
        if let Some((_, binding)) = self.bindings.remove(&guild) {
            if let Err(e) = self.transport.delete(binding.channel, binding.message).await {
                debug!(%guild, error = %e, "now-playing message already gone");
            }
        }
    }

    /// One-off notice to a channel, outside the bound message. Failures are
    /// logged and swallowed.
    pub async fn notice(&self, guild: GuildId, channel: ChannelId, content: String) {
        if let Err(e) = self.transport.send(channel, content).await {
            warn!(%guild, error = %e, "failed to send notice");
        }
    }

    #[must_use]
    pub fn binding(&self, guild: GuildId) -> Option<Binding> {
        self.bindings.get(&guild).map(|b| *b.value())
    }
}

/// Production transport over the serenity HTTP client.
pub struct SerenityChat {
    http: Arc<Http>,
}

impl SerenityChat {
    #[must_use]
    pub fn new(http: Arc<Http>) -> Self {
        SerenityChat { http }
    }
}

#[async_trait]
impl ChatTransport for SerenityChat {
    async fn send(
        &self,
        channel: ChannelId,
        content: String,
    ) -> Result<MessageId, ChorusError> {
        let message = channel
            .send_message(&self.http, CreateMessage::new().content(content))
            .await?;
        Ok(message.id)
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: String,
    ) -> Result<(), ChorusError> {
        channel
            .edit_message(&self.http, message, EditMessage::new().content(content))
            .await?;
        Ok(())
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), ChorusError> {
        channel.delete_message(&self.http, message).await?;
        Ok(())
    }
}
