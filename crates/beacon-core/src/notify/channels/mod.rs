//! Channel transports
//!
//! Each external channel (email bridge, chat bot) is a `ChannelTransport`.
//! Transports are best-effort: the fan-out queue logs their failures and
//! never reports them back to whoever raised the alert.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Channel;

use super::render::RenderedMessage;

mod log;
mod mock;
mod webhook;

pub use log::LogChannel;
pub use mock::MockChannel;
pub use webhook::WebhookChannel;

/// A delivery mechanism for one channel
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Which channel this transport serves
    fn channel(&self) -> Channel;

    /// Deliver a rendered message to a user
    async fn send(&self, user_id: i64, message: &RenderedMessage) -> Result<()>;
}
