//! Rendering notifications into channel messages

use serde::{Deserialize, Serialize};

use crate::models::{AlertKind, Channel, Notification, Priority};

/// A message ready for a transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub notification_id: i64,
    pub kind: AlertKind,
    pub priority: Priority,
    pub subject: String,
    pub body: String,
    pub metadata: serde_json::Value,
}

/// Turns a persisted notification into a message for one channel
pub trait Renderer: Send + Sync {
    fn render(&self, notification: &Notification, channel: Channel) -> RenderedMessage;
}

/// Title as subject, message as body. Urgent alerts get a marker on chat
/// channels.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl Renderer for PlainTextRenderer {
    fn render(&self, notification: &Notification, channel: Channel) -> RenderedMessage {
        let subject = match (channel, notification.priority) {
            (Channel::Bot, Priority::Urgent) => format!("[!] {}", notification.title),
            _ => notification.title.clone(),
        };

        RenderedMessage {
            notification_id: notification.id,
            kind: notification.kind,
            priority: notification.priority,
            subject,
            body: notification.message.clone(),
            metadata: notification.metadata.clone(),
        }
    }
}
