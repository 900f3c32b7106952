//! Mock transport for testing
//!
//! Records every delivery. Can be configured to fail or to stall.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::Channel;
use crate::notify::render::RenderedMessage;

use super::ChannelTransport;

/// Mock channel transport for testing
#[derive(Clone)]
pub struct MockChannel {
    channel: Channel,
    /// Whether send should return an error
    pub failing: bool,
    /// Artificial latency per send
    pub delay: Option<Duration>,
    sent: Arc<Mutex<Vec<(i64, RenderedMessage)>>>,
}

impl MockChannel {
    /// Create a mock that accepts every message
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            failing: false,
            delay: None,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock whose sends always fail
    pub fn failing(channel: Channel) -> Self {
        Self {
            failing: true,
            ..Self::new(channel)
        }
    }

    /// Create a mock that sleeps before each send
    pub fn slow(channel: Channel, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(channel)
        }
    }

    /// Messages delivered so far
    pub fn sent(&self) -> Vec<(i64, RenderedMessage)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChannelTransport for MockChannel {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, user_id: i64, message: &RenderedMessage) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(Error::Channel(format!("mock {} unavailable", self.channel)));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((user_id, message.clone()));
        }
        Ok(())
    }
}
