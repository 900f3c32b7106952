//! Transport that only writes to the log

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::models::Channel;
use crate::notify::render::RenderedMessage;

use super::ChannelTransport;

/// Logs each message instead of delivering it. Useful when no bridge is
/// configured.
#[derive(Debug, Clone, Copy)]
pub struct LogChannel {
    channel: Channel,
}

impl LogChannel {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ChannelTransport for LogChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, user_id: i64, message: &RenderedMessage) -> Result<()> {
        info!(
            user_id,
            channel = self.channel.as_str(),
            priority = message.priority.as_str(),
            "{}: {}",
            message.subject,
            message.body
        );
        Ok(())
    }
}
